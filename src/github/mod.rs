//! GitHub REST API access
//!
//! [`GitHubSource`] is the seam between the aggregation pipeline and the API:
//! [`client::GitHubClient`] implements it over HTTP, tests implement it with
//! fixture pages. Range resolution and the commit/diff aggregators only ever
//! talk to a `&dyn GitHubSource`.

pub mod client;
pub mod models;

use crate::error::{Error, GitHubError, RangeError, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// GitHub's documented ceiling on files returned for a single commit
pub const COMMIT_FILES_CAP: usize = 3000;

/// Target repository, parsed from `owner/repo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/repo`. Exactly two non-empty segments are accepted.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(owner, name))
            }
            _ => Err(Error::Range(RangeError::InvalidRepository(
                input.to_string(),
            ))),
        }
    }

    /// API path prefix, e.g. `/repos/owner/repo`
    pub fn api_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Where a page keeps its items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemsField {
    /// The page body is a JSON array
    Root,
    /// The page body is an object with the items under this key
    Field(&'static str),
}

/// A paginated GitHub listing
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Path below the API root, e.g. `/repos/o/r/compare/a...b`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub items: ItemsField,
    /// Field carrying GitHub's own count of the full listing
    pub total_field: Option<&'static str>,
    /// GitHub-side ceiling for this listing, if any
    pub cap: Option<usize>,
}

impl Endpoint {
    /// Commits between two refs
    pub fn compare(repo: &RepositoryRef, base: &str, head: &str) -> Self {
        Self {
            path: format!("{}/compare/{}...{}", repo.api_path(), base, head),
            query: Vec::new(),
            items: ItemsField::Field("commits"),
            total_field: Some("total_commits"),
            cap: None,
        }
    }

    /// Files touched by a single commit
    pub fn commit_files(repo: &RepositoryRef, sha: &str) -> Self {
        Self {
            path: format!("{}/commits/{}", repo.api_path(), sha),
            query: Vec::new(),
            items: ItemsField::Field("files"),
            total_field: None,
            cap: Some(COMMIT_FILES_CAP),
        }
    }
}

/// What to do when GitHub capped a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncationPolicy {
    /// Fail with `RangeTooLarge`
    #[default]
    Fail,
    /// Keep the partial listing and flag it
    Allow,
}

/// All pages of a listing, concatenated in order
#[derive(Debug, Clone, Default)]
pub struct Paged {
    pub items: Vec<Value>,
    /// GitHub's own count, when the endpoint reports one
    pub reported_total: Option<usize>,
    pub pages: u32,
    /// GitHub capped the listing and the caller allowed partial data
    pub truncated: bool,
}

/// Read access to GitHub used by the aggregation pipeline
#[async_trait::async_trait]
pub trait GitHubSource: Send + Sync {
    /// Fetch a single JSON document (not paginated)
    async fn fetch_one(&self, path: &str) -> Result<Value>;

    /// Fetch every page of a listing
    async fn fetch_paginated(&self, endpoint: &Endpoint, policy: TruncationPolicy)
        -> Result<Paged>;
}

/// Pull the items out of one page body.
pub fn extract_items(body: &Value, items: ItemsField, url: &str) -> Result<Vec<Value>> {
    let list = match items {
        ItemsField::Root => Some(body),
        ItemsField::Field(name) => body.get(name),
    };

    match list {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => Ok(values.clone()),
        Some(_) => Err(Error::GitHub(GitHubError::InvalidResponse {
            url: url.to_string(),
            details: match items {
                ItemsField::Root => "expected a JSON array".to_string(),
                ItemsField::Field(name) => format!("expected '{}' to be an array", name),
            },
        })),
    }
}

/// Decide whether a fully fetched listing was capped by GitHub.
///
/// Returns `Ok(true)` when truncated and allowed, `Ok(false)` when complete.
pub fn check_truncation(
    endpoint: &Endpoint,
    fetched: usize,
    reported_total: Option<usize>,
    policy: TruncationPolicy,
) -> Result<bool> {
    let short_of_total = reported_total.is_some_and(|total| total > fetched);
    let at_cap = endpoint.cap.is_some_and(|cap| fetched >= cap);

    if !short_of_total && !at_cap {
        return Ok(false);
    }

    match policy {
        TruncationPolicy::Fail => Err(Error::GitHub(GitHubError::RangeTooLarge {
            fetched,
            total: reported_total,
        })),
        TruncationPolicy::Allow => {
            warn!(
                "{} truncated by GitHub: fetched {} of {} items",
                endpoint.path,
                fetched,
                reported_total
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "more".to_string())
            );
            Ok(true)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_repository() {
        let repo = RepositoryRef::parse("mendableai/firecrawl").unwrap();
        assert_eq!(repo.owner, "mendableai");
        assert_eq!(repo.name, "firecrawl");
        assert_eq!(repo.to_string(), "mendableai/firecrawl");
        assert_eq!(repo.api_path(), "/repos/mendableai/firecrawl");
    }

    #[test]
    fn test_parse_repository_rejects_bad_shapes() {
        for input in ["firecrawl", "a/b/c", "/repo", "owner/", ""] {
            assert!(
                matches!(
                    RepositoryRef::parse(input),
                    Err(Error::Range(RangeError::InvalidRepository(_)))
                ),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_compare_endpoint() {
        let repo = RepositoryRef::new("o", "r");
        let endpoint = Endpoint::compare(&repo, "v1.0.0", "main");
        assert_eq!(endpoint.path, "/repos/o/r/compare/v1.0.0...main");
        assert_eq!(endpoint.items, ItemsField::Field("commits"));
        assert_eq!(endpoint.total_field, Some("total_commits"));
    }

    #[test]
    fn test_extract_items_variants() {
        let body = json!({"commits": [{"sha": "a"}, {"sha": "b"}]});
        let items = extract_items(&body, ItemsField::Field("commits"), "u").unwrap();
        assert_eq!(items.len(), 2);

        let missing = extract_items(&json!({}), ItemsField::Field("files"), "u").unwrap();
        assert!(missing.is_empty());

        let root = extract_items(&json!([1, 2, 3]), ItemsField::Root, "u").unwrap();
        assert_eq!(root.len(), 3);

        let wrong = extract_items(&json!({"files": "x"}), ItemsField::Field("files"), "u");
        assert!(matches!(
            wrong,
            Err(Error::GitHub(GitHubError::InvalidResponse { .. }))
        ));
    }

    #[test]
    fn test_check_truncation_short_of_total() {
        let endpoint = Endpoint::compare(&RepositoryRef::new("o", "r"), "a", "b");

        assert!(!check_truncation(&endpoint, 10, Some(10), TruncationPolicy::Fail).unwrap());

        let err = check_truncation(&endpoint, 250, Some(300), TruncationPolicy::Fail);
        assert!(matches!(
            err,
            Err(Error::GitHub(GitHubError::RangeTooLarge {
                fetched: 250,
                total: Some(300)
            }))
        ));

        assert!(check_truncation(&endpoint, 250, Some(300), TruncationPolicy::Allow).unwrap());
    }

    #[test]
    fn test_check_truncation_at_cap() {
        let endpoint = Endpoint::commit_files(&RepositoryRef::new("o", "r"), "abc");
        assert!(!check_truncation(&endpoint, 2999, None, TruncationPolicy::Fail).unwrap());
        assert!(check_truncation(&endpoint, COMMIT_FILES_CAP, None, TruncationPolicy::Fail).is_err());
    }
}
