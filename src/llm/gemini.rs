//! Gemini CLI subprocess invocation
//!
//! Invokes `@google/gemini-cli` via npx. The CLI takes a single prompt, so the
//! system block is prepended to the user block.

use crate::error::{Error, LlmError};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Gemini CLI client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    /// Timeout for subprocess execution (default: 300s / 5 minutes)
    pub timeout_secs: u64,
}

impl GeminiClient {
    /// Create a new Gemini client with default configuration
    pub fn new() -> Self {
        Self { timeout_secs: 300 }
    }

    /// Query Gemini CLI and return the response
    pub async fn query(&self, system: &str, user: &str) -> Result<String, Error> {
        let prompt = combine_prompt(system, user);
        let mut cmd = Command::new("npx");
        cmd.args(["@google/gemini-cli", "-p", &prompt])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(
            "Executing: npx @google/gemini-cli -p [prompt: {} chars]",
            prompt.len()
        );

        let timeout_duration = Duration::from_secs(self.timeout_secs);
        let child = cmd.spawn().map_err(|e| {
            Error::Llm(LlmError::RequestFailed {
                model: "gemini".to_string(),
                reason: format!("Failed to spawn process: {}", e),
            })
        })?;

        let output = tokio::time::timeout(timeout_duration, child.wait_with_output())
            .await
            .map_err(|_| Error::Llm(LlmError::RequestFailed {
                model: "gemini".to_string(),
                reason: format!("Timeout after {}s", self.timeout_secs),
            }))?
            .map_err(|e| Error::Llm(LlmError::RequestFailed {
                model: "gemini".to_string(),
                reason: format!("Process error: {}", e),
            }))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Llm(LlmError::RequestFailed {
                model: "gemini".to_string(),
                reason: stderr.trim().to_string(),
            }));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|e| {
            Error::Llm(LlmError::InvalidResponse {
                model: "gemini".to_string(),
                details: format!("Invalid UTF-8 in stdout: {}", e),
            })
        })?;

        if stdout.trim().is_empty() {
            return Err(Error::Llm(LlmError::InvalidResponse {
                model: "gemini".to_string(),
                details: "Empty output".to_string(),
            }));
        }

        debug!("Gemini query completed successfully");
        Ok(stdout.trim().to_string())
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn combine_prompt(system: &str, user: &str) -> String {
    format!("{}\n\n{}", system.trim(), user.trim())
}

#[async_trait::async_trait]
impl crate::llm::LLMProvider for GeminiClient {
    async fn query(&self, system: &str, user: &str) -> Result<String, Error> {
        self.query(system, user).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let client = GeminiClient::new();
        assert_eq!(client.timeout_secs, 300);
    }

    #[test]
    fn test_combine_prompt() {
        assert_eq!(
            combine_prompt("Be concise.\n", "\nList changes."),
            "Be concise.\n\nList changes."
        );
    }
}
