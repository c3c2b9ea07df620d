use std::time::Duration;
use thiserror::Error;

// Errors raised by the generation pipeline. Every variant is recoverable:
// role handlers fall back to canned behavior instead of surfacing these.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration), // A single attempt exceeded its time budget.

    #[error("generation API error: {0}")]
    Api(String), // The provider returned an error or an empty completion.

    #[error("unexpected generation failure: {0}")]
    Unexpected(String), // Anything that is neither a timeout nor a provider error.
}

// Configuration problems are fatal at startup, never per-action.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no API key configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("unknown LLM provider: {0}")]
    UnknownProvider(String),
}

// Failure of the action task itself (panic or cancelled join). Handlers
// recover everything else internally, so this is the only error the
// dispatcher can report.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("action task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for AgentError {
    fn from(err: tokio::task::JoinError) -> Self {
        AgentError::Task(err.to_string())
    }
}
