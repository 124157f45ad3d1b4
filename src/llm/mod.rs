//! LLM provider abstraction and implementations
//!
//! Providers run as subprocesses (`claude`, `gemini`) and receive two prompt
//! blocks: a fixed system instruction and the data-filled user request.

pub mod claude;
pub mod gemini;
pub mod prompts;

use crate::config::LlmConfig;
use crate::error::{Error, LlmError};

/// Common trait for LLM providers
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send the system and user blocks and return the generated text
    async fn query(&self, system: &str, user: &str) -> Result<String, Error>;

    /// Get the provider name (e.g., "claude", "gemini")
    fn name(&self) -> &str;
}

/// Build the provider named in the configuration.
pub fn provider_from_config(config: &LlmConfig) -> Result<Box<dyn LLMProvider>, Error> {
    match config.provider.to_lowercase().as_str() {
        "claude" => Ok(Box::new(claude::ClaudeClient::with_config(
            claude::ClaudeConfig {
                timeout_secs: config.timeout_secs,
                max_retries: config.max_retries,
            },
        ))),
        "gemini" => Ok(Box::new(gemini::GeminiClient {
            timeout_secs: config.timeout_secs,
        })),
        other => Err(Error::Llm(LlmError::UnknownProvider(other.to_string()))),
    }
}
