use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::ConfigError;

// Application settings, stored as a JSON file next to the agent data.
#[derive(Serialize, Deserialize, Clone)]
pub struct Settings {
    pub agent: AgentSettings,
    pub llm: LlmSettings,
    pub log: LogSettings,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct AgentSettings {
    pub name: String, // Connection name reported to the server.
    /// Abort a handler that overruns the server deadline instead of letting
    /// it finish in the background.
    pub kill_on_timeout: bool,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct LlmSettings {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub openai_api_key: Option<String>, // Falls back to OPENAI_API_KEY when absent.
    pub attempt_timeout_ms: u64,        // Budget for a single generation attempt.
    pub max_retries: u32,               // Extra attempts after the first failure.
    pub backoff_unit_ms: u64,           // Base delay; doubles on every retry.
}

#[derive(Serialize, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
    pub dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            agent: AgentSettings {
                name: "howl1".to_string(),
                kill_on_timeout: false,
            },
            llm: LlmSettings {
                enabled: true,
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                openai_api_key: None,
                attempt_timeout_ms: 10_000,
                max_retries: 2,
                backoff_unit_ms: 1_000,
            },
            log: LogSettings {
                level: "debug".to_string(),
                dir: None,
            },
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    // Load settings from a default file path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("./data/settings.json")
    }

    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self)?;
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }

    /// The key for the generation provider, from settings or the environment.
    /// Missing credentials are a startup failure, never a per-action one.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.llm.openai_api_key.as_deref()
            && !key.is_empty()
        {
            return Ok(key.to_string());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(self.llm.provider.clone()))
    }
}
