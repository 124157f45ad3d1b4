//! Configuration for llm-changelog
//!
//! Loaded from an optional TOML file. Every field has a default, so an empty
//! file (or no file at all) yields a working configuration.
//!
//! ```toml
//! [github]
//! api_url = "https://api.github.com"
//! per_page = 100
//! max_retries = 3
//! max_rate_limit_wait_secs = 900
//!
//! [payload]
//! max_commits = 250
//! max_files = 50
//!
//! [llm]
//! provider = "claude"
//! timeout_secs = 120
//! ```

use crate::error::{ConfigError, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// GitHub API access and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Items requested per page (GitHub caps this at 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Attempts for transient failures (5xx, connection errors)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Longest rate-limit reset we are willing to sleep through
    #[serde(default = "default_max_rate_limit_wait_secs")]
    pub max_rate_limit_wait_secs: u64,
    /// Rate-limit waits allowed per request before giving up
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_rate_limit_wait_secs() -> u64 {
    900
}

fn default_rate_limit_retries() -> u32 {
    1
}

fn default_github_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("llm-changelog/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            per_page: default_per_page(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait_secs(),
            rate_limit_retries: default_rate_limit_retries(),
            timeout_secs: default_github_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Size ceiling for the prompt payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_max_commits() -> usize {
    250
}

fn default_max_files() -> usize {
    50
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            max_commits: default_max_commits(),
            max_files: default_max_files(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider() -> String {
    "claude".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path).map_err(|source| {
            Error::Config(ConfigError::ReadFailed {
                path: path.display().to_string(),
                source,
            })
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::Config(ConfigError::ParseFailed {
                path: path.display().to_string(),
                details: e.to_string(),
            })
        })
    }
}
