//! Paginated, rate-limit-aware GitHub REST client
//!
//! Every request goes through one retry loop:
//! - 403/429 carrying rate-limit signals sleep until the reset time (bounded by
//!   `max_rate_limit_wait_secs`) and retry the same page
//! - 5xx and connection failures retry with exponential backoff
//! - any other 4xx fails immediately with GitHub's message
//!
//! Pagination follows the `Link: rel="next"` header, so a page that succeeds
//! after a rate-limit wait is never fetched twice.

use super::{check_truncation, extract_items, Endpoint, GitHubSource, Paged, TruncationPolicy};
use crate::config::GitHubConfig;
use crate::error::{Error, GitHubError, Result};
use chrono::Utc;
use reqwest::header::{HeaderMap, ACCEPT, LINK, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_VERSION: &str = "2022-11-28";

/// GitHub error body (`{"message": "..."}`)
#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
}

/// One successfully fetched page
#[derive(Debug)]
struct Page {
    body: Value,
    next: Option<String>,
}

/// Result of a single HTTP attempt
#[derive(Debug)]
enum Attempt {
    Success(Page),
    RateLimited { wait: Option<Duration> },
    Transient(String),
    Failed(Error),
}

/// Retry bookkeeping for one request. Never shared between requests.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RetryState {
    /// Transient failures seen so far
    pub failures: u32,
    /// Rate-limit waits already taken
    pub rate_limit_waits: u32,
    pub backoff: Duration,
}

impl RetryState {
    pub(crate) fn new(config: &GitHubConfig) -> Self {
        Self {
            failures: 0,
            rate_limit_waits: 0,
            backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }

    /// Next delay after a rate-limit response, or the error to surface.
    pub(crate) fn after_rate_limit(
        self,
        wait: Option<Duration>,
        config: &GitHubConfig,
        url: &str,
    ) -> Result<(Duration, RetryState)> {
        let delay = wait.unwrap_or(self.backoff);
        let exceeded = || {
            Error::GitHub(GitHubError::RateLimitExceeded {
                url: url.to_string(),
                reset_in_secs: Some(delay.as_secs()),
            })
        };

        if self.rate_limit_waits >= config.rate_limit_retries {
            return Err(exceeded());
        }
        if delay > Duration::from_secs(config.max_rate_limit_wait_secs) {
            return Err(exceeded());
        }

        Ok((
            delay,
            RetryState {
                rate_limit_waits: self.rate_limit_waits + 1,
                backoff: self.backoff * 2,
                ..self
            },
        ))
    }

    /// Next delay after a transient failure, or the error to surface.
    pub(crate) fn after_transient(
        self,
        reason: String,
        config: &GitHubConfig,
    ) -> Result<(Duration, RetryState)> {
        let failures = self.failures + 1;
        if failures >= config.max_retries {
            return Err(Error::GitHub(GitHubError::Unavailable {
                attempts: failures,
                reason,
            }));
        }

        Ok((
            self.backoff,
            RetryState {
                failures,
                backoff: self.backoff * 2,
                ..self
            },
        ))
    }
}

/// GitHub REST client
pub struct GitHubClient {
    http: Client,
    config: GitHubConfig,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client. `token` is sent as a bearer token on every request.
    pub fn new(config: GitHubConfig, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::GitHub(GitHubError::Unavailable {
                    attempts: 0,
                    reason: format!("Failed to build HTTP client: {}", e),
                })
            })?;

        Ok(Self {
            http,
            config,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Absolute URL for an API path plus query parameters
    fn url(&self, path: &str, query: &[(String, String)]) -> Result<String> {
        let raw = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);
        let url = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };

        url.map(String::from).map_err(|e| {
            Error::GitHub(GitHubError::InvalidResponse {
                url: raw.clone(),
                details: format!("Invalid request URL: {}", e),
            })
        })
    }

    /// GET a URL under the retry policy
    async fn get(&self, url: &str) -> Result<Page> {
        let mut state = RetryState::new(&self.config);

        loop {
            match self.attempt(url).await {
                Attempt::Success(page) => return Ok(page),
                Attempt::Failed(e) => return Err(e),
                Attempt::RateLimited { wait } => {
                    let (delay, next) = state.after_rate_limit(wait, &self.config, url)?;
                    warn!(
                        "Rate limited on {}, waiting {}s before retrying",
                        url,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                    state = next;
                }
                Attempt::Transient(reason) => {
                    let (delay, next) = state.after_transient(reason.clone(), &self.config)?;
                    warn!(
                        "Request to {} failed (attempt {}), retrying in {}ms: {}",
                        url,
                        next.failures,
                        delay.as_millis(),
                        reason
                    );
                    tokio::time::sleep(delay).await;
                    state = next;
                }
            }
        }
    }

    /// Execute a single attempt without retry
    async fn attempt(&self, url: &str) -> Attempt {
        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!("GET {}", url);
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Transient(format!("Network error: {}", e)),
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::Transient(format!("Failed to read body: {}", e)),
        };

        classify(status, &headers, body, url, Utc::now().timestamp())
    }
}

/// Turn an HTTP response into a retry decision.
fn classify(status: StatusCode, headers: &HeaderMap, body: String, url: &str, now: i64) -> Attempt {
    if status.is_success() {
        return match serde_json::from_str(&body) {
            Ok(value) => Attempt::Success(Page {
                body: value,
                next: header_str(headers, LINK.as_str()).and_then(parse_next_link),
            }),
            Err(e) => Attempt::Failed(Error::GitHub(GitHubError::InvalidResponse {
                url: url.to_string(),
                details: format!("Failed to parse JSON: {}", e),
            })),
        };
    }

    let code = status.as_u16();
    let remaining = header_str(headers, "x-ratelimit-remaining").and_then(|v| v.parse::<u64>().ok());
    let retry_after = header_str(headers, RETRY_AFTER.as_str()).and_then(|v| v.parse::<u64>().ok());
    let reset = header_str(headers, "x-ratelimit-reset").and_then(|v| v.parse::<i64>().ok());

    if is_rate_limited(code, remaining, retry_after.is_some(), &body) {
        return Attempt::RateLimited {
            wait: rate_limit_wait(retry_after, reset, now),
        };
    }

    let message = github_message(&body);
    if status.is_server_error() {
        return Attempt::Transient(format!("{}: {}", code, message));
    }

    Attempt::Failed(Error::GitHub(GitHubError::UpstreamClient {
        status: code,
        message,
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// 429 is always a rate limit; 403 only when GitHub says so.
fn is_rate_limited(status: u16, remaining: Option<u64>, has_retry_after: bool, body: &str) -> bool {
    match status {
        429 => true,
        403 => {
            remaining == Some(0)
                || has_retry_after
                || body.to_lowercase().contains("rate limit")
        }
        _ => false,
    }
}

/// How long GitHub asked us to wait, if it said.
fn rate_limit_wait(retry_after: Option<u64>, reset_epoch: Option<i64>, now: i64) -> Option<Duration> {
    if let Some(secs) = retry_after {
        return Some(Duration::from_secs(secs));
    }
    reset_epoch.map(|reset| Duration::from_secs((reset - now).max(0) as u64))
}

/// GitHub's `message` field, or the raw body when it is not JSON.
fn github_message(body: &str) -> String {
    serde_json::from_str::<GitHubErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Extract the `rel="next"` URL from a `Link` header.
pub(crate) fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut sections = part.split(';');
        let target = sections.next()?.trim();
        let is_next = sections.any(|s| s.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[async_trait::async_trait]
impl GitHubSource for GitHubClient {
    async fn fetch_one(&self, path: &str) -> Result<Value> {
        let url = self.url(path, &[])?;
        Ok(self.get(&url).await?.body)
    }

    async fn fetch_paginated(
        &self,
        endpoint: &Endpoint,
        policy: TruncationPolicy,
    ) -> Result<Paged> {
        let mut query = endpoint.query.clone();
        query.push(("per_page".to_string(), self.config.per_page.to_string()));
        let mut url = self.url(&endpoint.path, &query)?;

        let mut paged = Paged::default();
        loop {
            let page = self.get(&url).await?;
            paged.pages += 1;

            if paged.reported_total.is_none() {
                paged.reported_total = endpoint
                    .total_field
                    .and_then(|field| page.body.get(field))
                    .and_then(Value::as_u64)
                    .map(|n| n as usize);
            }

            let items = extract_items(&page.body, endpoint.items, &url)?;
            debug!("Page {} of {}: {} items", paged.pages, endpoint.path, items.len());
            let empty = items.is_empty();
            paged.items.extend(items);

            match page.next {
                Some(next) if !empty => url = next,
                _ => break,
            }
        }

        info!(
            "Fetched {} items from {} in {} page(s)",
            paged.items.len(),
            endpoint.path,
            paged.pages
        );

        paged.truncated =
            check_truncation(endpoint, paged.items.len(), paged.reported_total, policy)?;
        Ok(paged)
    }
}
