use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{ConfigError, LlmError};
use crate::settings::Settings;

/// One generation backend. Implementations make a single bounded attempt;
/// retry policy lives in [`Generator`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;
}

/// Chat-completion client for the OpenAI API.
pub struct OpenAiChat {
    client: Client<OpenAIConfig>,
    model: String,
    attempt_timeout: Duration,
}

impl OpenAiChat {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let api_key = settings.resolve_api_key()?;
        let config = OpenAIConfig::new().with_api_key(api_key);
        Ok(OpenAiChat {
            client: Client::with_config(config),
            model: settings.llm.model.clone(),
            attempt_timeout: Duration::from_millis(settings.llm.attempt_timeout_ms),
        })
    }

    async fn request(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| LlmError::Unexpected(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()
                    .map_err(|e| LlmError::Unexpected(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| LlmError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::Api("empty completion".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiChat {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        match timeout(self.attempt_timeout, self.request(system_prompt, user_prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.attempt_timeout)),
        }
    }
}

/// Retry wrapper around a generation backend: the first attempt plus up to
/// `max_retries` more, with a doubling backoff delay in between. Timeouts
/// retry exactly like API errors. The last classified error is raised once
/// attempts are exhausted; callers treat that as "no generation available".
pub struct Generator {
    client: Arc<dyn LlmClient>,
    max_retries: u32,
    backoff_unit: Duration,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, max_retries: u32, backoff_unit: Duration) -> Self {
        Generator {
            client,
            max_retries,
            backoff_unit,
        }
    }

    /// Build the configured provider, or `None` when generation is disabled.
    /// An unknown provider name or missing credential is fatal here, at
    /// startup, rather than surfacing mid-game.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>, ConfigError> {
        if !settings.llm.enabled {
            log::info!("generation is disabled in config");
            return Ok(None);
        }
        let client: Arc<dyn LlmClient> = match settings.llm.provider.as_str() {
            "openai" => Arc::new(OpenAiChat::new(settings)?),
            other => return Err(ConfigError::UnknownProvider(other.to_string())),
        };
        log::info!(
            "generation client initialized: provider={} model={}",
            settings.llm.provider,
            settings.llm.model
        );
        Ok(Some(Generator::new(
            client,
            settings.llm.max_retries,
            Duration::from_millis(settings.llm.backoff_unit_ms),
        )))
    }

    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LlmError> {
        let attempts = self.max_retries + 1;
        let mut last_error = LlmError::Unexpected("no attempt was made".to_string());

        for attempt in 0..attempts {
            match self.client.complete(system_prompt, user_prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    log::warn!("generation attempt {}/{} failed: {}", attempt + 1, attempts, e);
                    last_error = e;
                }
            }
            if attempt + 1 < attempts {
                let wait = self.backoff_unit * 2u32.pow(attempt);
                log::debug!("retrying generation in {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        Err(last_error)
    }
}
