//! Subsets of GitHub REST responses the pipeline reads.

use crate::error::{Error, GitHubError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Deserialize)]
pub struct RepositoryInfo {
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// One entry of a comparison's `commits` list
#[derive(Debug, Deserialize)]
pub struct ApiCommit {
    pub sha: String,
    pub commit: GitCommit,
    /// Linked GitHub account; null when the author email matches no user
    #[serde(default)]
    pub author: Option<ApiUser>,
    #[serde(default)]
    pub parents: Vec<ApiParent>,
}

#[derive(Debug, Deserialize)]
pub struct ApiParent {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct GitCommit {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<GitSignature>,
}

#[derive(Debug, Deserialize)]
pub struct GitSignature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
    pub login: String,
}

/// One entry of a commit's `files` list
#[derive(Debug, Deserialize)]
pub struct ApiFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub previous_filename: Option<String>,
}

/// Deserialize a raw JSON item, reporting failures against `url`.
pub fn decode<T: DeserializeOwned>(value: Value, url: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        Error::GitHub(GitHubError::InvalidResponse {
            url: url.to_string(),
            details: e.to_string(),
        })
    })
}
