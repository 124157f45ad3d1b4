//! Error types for llm-changelog
//!
//! Every failure mode of a single invocation:
//! - Range errors (contradictory range options, unknown tags or branches)
//! - GitHub API errors (rate limits, client errors, outages, truncated comparisons)
//! - LLM requests (subprocess failures, rate limits, malformed responses)
//! - Configuration loading
//! - File I/O (writing the changelog)

use std::io;
use thiserror::Error;

/// Result type alias for llm-changelog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for llm-changelog
#[derive(Debug, Error)]
pub enum Error {
    /// Range specification and resolution errors
    #[error("Range error: {0}")]
    Range(#[from] RangeError),
    /// GitHub API errors
    #[error("GitHub error: {0}")]
    GitHub(#[from] GitHubError),
    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Errors raised while validating or resolving a commit range
#[derive(Debug, Error)]
pub enum RangeError {
    /// Neither or both range forms were given, or a tag pair is incomplete
    #[error("Invalid range: {0}")]
    Invalid(String),
    /// Repository argument is not in `owner/repo` form
    #[error("Invalid repository '{0}': expected 'owner/repo'")]
    InvalidRepository(String),
    /// Tag or branch does not exist in the target repository
    #[error("Reference not found: {reference}")]
    RefNotFound { reference: String },
}

/// GitHub REST API errors
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Rate limit could not be cleared within the allowed wait
    #[error("Rate limit exceeded for {url}{}", seconds_suffix("resets in", .reset_in_secs))]
    RateLimitExceeded {
        url: String,
        reset_in_secs: Option<u64>,
    },
    /// GitHub rejected the request (4xx other than rate limiting)
    #[error("GitHub returned {status}: {message}")]
    UpstreamClient { status: u16, message: String },
    /// Network failure or 5xx after exhausting retries
    #[error("GitHub unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },
    /// GitHub capped the listing and partial data was not allowed
    #[error(
        "Comparison too large: fetched {fetched} of {} items (use --allow-partial to proceed with partial data)",
        total_label(.total)
    )]
    RangeTooLarge { fetched: usize, total: Option<usize> },
    /// Response body did not match the expected shape
    #[error("Invalid response from {url}: {details}")]
    InvalidResponse { url: String, details: String },
    /// Repository metadata carried no default branch
    #[error("Repository {0} reports no default branch")]
    MissingDefaultBranch(String),
}

/// LLM provider errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// Subprocess could not run or failed (spawn failure, timeout, non-zero exit)
    #[error("Request to {model} failed: {reason}")]
    RequestFailed { model: String, reason: String },
    /// Provider output malformed (invalid JSON, missing fields)
    #[error("Invalid response from {model}: {details}")]
    InvalidResponse { model: String, details: String },
    /// Rate limit exceeded
    #[error("Rate limit exceeded for {model}{}", seconds_suffix("retry after", .retry_after))]
    RateLimitExceeded {
        model: String,
        retry_after: Option<u64>,
    },
    /// Provider rejected credentials
    #[error("Authentication failed for {0}")]
    AuthenticationFailed(String),
    /// Provider offline or overloaded
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    /// Provider name not recognised
    #[error("Unknown provider '{0}' (expected 'claude' or 'gemini')")]
    UnknownProvider(String),
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {path}: {source}")]
    ReadFailed { path: String, source: io::Error },
    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse {path}: {details}")]
    ParseFailed { path: String, details: String },
}

/// File I/O errors
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to write the changelog file
    #[error("Failed to write {path}: {source}")]
    FileWriteFailed { path: String, source: io::Error },
    /// Other I/O error
    #[error("{0}")]
    Other(#[from] io::Error),
}

fn seconds_suffix(label: &str, seconds: &Option<u64>) -> String {
    match seconds {
        Some(secs) => format!(" ({} {} seconds)", label, secs),
        None => String::new(),
    }
}

fn total_label(total: &Option<usize>) -> String {
    total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "more".to_string())
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(IoError::Other(err))
    }
}

impl Error {
    /// Check if error is retryable (network issues, rate limits)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::GitHub(GitHubError::Unavailable { .. })
                | Error::GitHub(GitHubError::RateLimitExceeded { .. })
                | Error::Llm(LlmError::RequestFailed { .. })
                | Error::Llm(LlmError::RateLimitExceeded { .. })
                | Error::Llm(LlmError::ModelUnavailable(_))
        )
    }

    /// Check if error is caused by user input and can never succeed on retry
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Range(_)
                | Error::Config(_)
                | Error::GitHub(GitHubError::UpstreamClient { .. })
                | Error::GitHub(GitHubError::RangeTooLarge { .. })
                | Error::Llm(LlmError::AuthenticationFailed(_))
                | Error::Llm(LlmError::UnknownProvider(_))
        )
    }

    /// Get formatted context string for logging
    pub fn context(&self) -> String {
        match self {
            Error::Range(e) => format!("range: {}", e),
            Error::GitHub(e) => format!("github: {}", e),
            Error::Llm(e) => format!("llm: {}", e),
            Error::Config(e) => format!("config: {}", e),
            Error::Io(e) => format!("io: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_range_error_display() {
        let err = Error::Range(RangeError::RefNotFound {
            reference: "v9.9.9".to_string(),
        });
        assert_eq!(err.to_string(), "Range error: Reference not found: v9.9.9");
    }

    #[test]
    fn test_rate_limit_display_with_reset() {
        let err = Error::GitHub(GitHubError::RateLimitExceeded {
            url: "https://api.github.com/repos/o/r".to_string(),
            reset_in_secs: Some(600),
        });
        assert_eq!(
            err.to_string(),
            "GitHub error: Rate limit exceeded for https://api.github.com/repos/o/r (resets in 600 seconds)"
        );
    }

    #[test]
    fn test_range_too_large_display() {
        let err = GitHubError::RangeTooLarge {
            fetched: 250,
            total: Some(400),
        };
        assert!(err.to_string().contains("fetched 250 of 400 items"));

        let err = GitHubError::RangeTooLarge {
            fetched: 3000,
            total: None,
        };
        assert!(err.to_string().contains("fetched 3000 of more items"));
    }

    #[test]
    fn test_llm_error_display() {
        let err = Error::Llm(LlmError::RateLimitExceeded {
            model: "claude".to_string(),
            retry_after: Some(60),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: Rate limit exceeded for claude (retry after 60 seconds)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(IoError::Other(_))));
    }

    #[test]
    fn test_is_retryable() {
        let retryable = Error::GitHub(GitHubError::Unavailable {
            attempts: 3,
            reason: "502 Bad Gateway".to_string(),
        });
        assert!(retryable.is_retryable());

        let not_retryable = Error::GitHub(GitHubError::UpstreamClient {
            status: 401,
            message: "Bad credentials".to_string(),
        });
        assert!(!not_retryable.is_retryable());
    }

    #[test]
    fn test_is_fatal() {
        let fatal = Error::Range(RangeError::Invalid("no range".to_string()));
        assert!(fatal.is_fatal());

        let not_fatal = Error::Llm(LlmError::RequestFailed {
            model: "gemini".to_string(),
            reason: "timeout".to_string(),
        });
        assert!(!not_fatal.is_fatal());
    }

    #[test]
    fn test_context() {
        let err = Error::Range(RangeError::InvalidRepository("nope".to_string()));
        assert_eq!(
            err.context(),
            "range: Invalid repository 'nope': expected 'owner/repo'"
        );
    }

    #[test]
    fn test_error_source_chain() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::Io(IoError::FileWriteFailed {
            path: "out.md".to_string(),
            source: io_err,
        });
        assert!(err.source().is_some());
    }
}
