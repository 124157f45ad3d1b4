//! Claude CLI subprocess invocation with JSON parsing
//!
//! Runs `claude -p` in print mode with JSON output, passing the changelog
//! style instructions as the system prompt. Handles timeouts, rate limits and
//! retries with exponential backoff.

use crate::error::{Error, LlmError};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

static RETRY_AFTER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)retry[- ]after:?\s*(\d+)").expect("retry-after pattern is valid")
});

/// Configuration for Claude CLI client
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    /// Timeout for subprocess execution (default: 120s)
    pub timeout_secs: u64,
    /// Maximum attempts (default: 3)
    pub max_retries: u32,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

/// Claude CLI client
pub struct ClaudeClient {
    config: ClaudeConfig,
}

impl ClaudeClient {
    /// Create a new Claude client with default configuration
    pub fn new() -> Self {
        Self {
            config: ClaudeConfig::default(),
        }
    }

    /// Create a new Claude client with custom configuration
    pub fn with_config(config: ClaudeConfig) -> Self {
        Self { config }
    }

    /// Query Claude CLI with retry logic
    pub async fn query(&self, system: &str, user: &str) -> Result<String, Error> {
        let mut attempts = 0;
        let mut backoff_ms = 1000;

        loop {
            attempts += 1;
            debug!("Claude query attempt {} of {}", attempts, self.config.max_retries);

            match self.query_once(system, user).await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.config.max_retries => {
                    warn!("Claude query failed after {} attempts", attempts);
                    return Err(e);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Claude query failed (attempt {}), retrying in {}ms: {}", attempts, backoff_ms, e);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
                Err(e) => {
                    warn!("Claude query failed with non-retryable error: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Execute a single query attempt without retry
    async fn query_once(&self, system: &str, user: &str) -> Result<String, Error> {
        let mut cmd = Command::new("claude");
        cmd.args(["-p", user, "--output-format", "json", "--system-prompt", system])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(
            "Executing: claude -p --output-format json [system: {} chars, prompt: {} chars]",
            system.len(),
            user.len()
        );

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let child = cmd.spawn().map_err(|e| {
            Error::Llm(LlmError::RequestFailed {
                model: "claude".to_string(),
                reason: format!("Failed to spawn process: {}", e),
            })
        })?;

        let output = tokio::time::timeout(timeout_duration, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Llm(LlmError::RequestFailed {
                    model: "claude".to_string(),
                    reason: format!("Timeout after {}s", self.config.timeout_secs),
                })
            })?
            .map_err(|e| {
                Error::Llm(LlmError::RequestFailed {
                    model: "claude".to_string(),
                    reason: format!("Process error: {}", e),
                })
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(parse_error(&stderr));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|e| {
            Error::Llm(LlmError::InvalidResponse {
                model: "claude".to_string(),
                details: format!("Invalid UTF-8 in output: {}", e),
            })
        })?;

        let response = parse_response(&stdout)?;
        debug!("Claude query completed successfully");
        Ok(response)
    }
}

impl Default for ClaudeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from Claude CLI (`--output-format json`)
#[derive(Debug, Deserialize, Serialize)]
pub struct ClaudeResponse {
    /// Generated text
    #[serde(default)]
    pub result: String,
    /// Set when the run ended in an error
    #[serde(default)]
    pub is_error: bool,
}

/// Extract the generated text from the CLI's JSON output.
fn parse_response(stdout: &str) -> Result<String, Error> {
    let response: ClaudeResponse = serde_json::from_str(stdout).map_err(|e| {
        Error::Llm(LlmError::InvalidResponse {
            model: "claude".to_string(),
            details: format!(
                "Failed to parse JSON: {}. Output: {}",
                e,
                stdout.chars().take(200).collect::<String>()
            ),
        })
    })?;

    if response.is_error {
        return Err(parse_error(&response.result));
    }
    if response.result.trim().is_empty() {
        return Err(Error::Llm(LlmError::InvalidResponse {
            model: "claude".to_string(),
            details: "Empty result".to_string(),
        }));
    }

    Ok(response.result.trim().to_string())
}

/// Parse error text to determine error type
fn parse_error(stderr: &str) -> Error {
    let lower = stderr.to_lowercase();

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("quota exceeded") {
        return Error::Llm(LlmError::RateLimitExceeded {
            model: "claude".to_string(),
            retry_after: extract_retry_after(stderr),
        });
    }

    if lower.contains("unauthorized") || lower.contains("authentication") || lower.contains("401") {
        return Error::Llm(LlmError::AuthenticationFailed("claude".to_string()));
    }

    if lower.contains("503") || lower.contains("unavailable") || lower.contains("overloaded") {
        return Error::Llm(LlmError::ModelUnavailable("claude".to_string()));
    }

    Error::Llm(LlmError::RequestFailed {
        model: "claude".to_string(),
        reason: stderr.trim().to_string(),
    })
}

/// Extract retry-after duration from error message
fn extract_retry_after(stderr: &str) -> Option<u64> {
    RETRY_AFTER.captures(stderr)?.get(1)?.as_str().parse().ok()
}

#[async_trait::async_trait]
impl crate::llm::LLMProvider for ClaudeClient {
    async fn query(&self, system: &str, user: &str) -> Result<String, Error> {
        self.query(system, user).await
    }

    fn name(&self) -> &str {
        "claude"
    }
}
