//! Commit aggregation for a resolved range
//!
//! Reads the comparison's commit list page by page, converts each entry into a
//! [`CommitRecord`] and drops repeated shas (first occurrence wins). Records
//! keep GitHub's order, which is oldest first.

use crate::error::Result;
use crate::github::models::{decode, ApiCommit};
use crate::github::{Endpoint, GitHubSource, RepositoryRef, TruncationPolicy};
use crate::range::ResolvedRange;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use tracing::{debug, info};

/// `#123` preceded by start of text, whitespace or an opening bracket/comma
static PR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(\[,])#(\d+)\b").expect("PR reference pattern is valid")
});

/// A single commit in the range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub sha: String,
    /// Linked GitHub login, or the raw git author name
    pub author: String,
    /// First line of the message
    pub title: String,
    /// Remainder of the message, trimmed
    pub body: String,
    pub date: Option<DateTime<Utc>>,
    /// PR/issue numbers mentioned in the message.
    ///
    /// Best effort: textual `#123` matches only, so squash-merge messages can
    /// yield extra or missing numbers.
    pub pr_refs: BTreeSet<u64>,
    /// Number of parent commits; more than one marks a merge
    pub parent_count: usize,
}

impl CommitRecord {
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }

    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }

    /// Full message, title and body rejoined
    pub fn message(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.body)
        }
    }

    fn from_api(commit: ApiCommit) -> Self {
        let signature = commit.commit.author;
        let author = commit
            .author
            .map(|user| user.login)
            .or_else(|| signature.as_ref().and_then(|s| s.name.clone()))
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let date = signature
            .and_then(|s| s.date)
            .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
            .map(|d| d.with_timezone(&Utc));

        let message = commit.commit.message;
        let (title, body) = split_message(&message);

        Self {
            sha: commit.sha,
            author,
            title,
            body,
            date,
            pr_refs: extract_pr_refs(&message),
            parent_count: commit.parents.len(),
        }
    }
}

/// Deduplicated commits of a range
#[derive(Debug, Clone, Default)]
pub struct CommitSet {
    /// Oldest first
    pub commits: Vec<CommitRecord>,
    /// GitHub's `total_commits`, when reported
    pub total: Option<usize>,
    /// GitHub capped the comparison and partial data was allowed
    pub truncated: bool,
}

/// Split a commit message into its title line and trimmed remainder.
pub fn split_message(message: &str) -> (String, String) {
    let message = message.trim();
    match message.split_once('\n') {
        Some((title, rest)) => (title.trim().to_string(), rest.trim().to_string()),
        None => (message.to_string(), String::new()),
    }
}

/// Numbers written as `#123` in a commit message.
pub fn extract_pr_refs(message: &str) -> BTreeSet<u64> {
    PR_REF
        .captures_iter(message)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// Keep the first record for every sha, preserving order.
pub fn dedup_commits(commits: impl IntoIterator<Item = CommitRecord>) -> Vec<CommitRecord> {
    let mut seen = HashSet::new();
    commits
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.sha.clone());
            if !fresh {
                debug!("Dropping repeated commit {}", c.short_sha());
            }
            fresh
        })
        .collect()
}

/// Fetch and deduplicate the commits between the range endpoints.
pub async fn aggregate_commits(
    source: &dyn GitHubSource,
    repo: &RepositoryRef,
    range: &ResolvedRange,
    policy: TruncationPolicy,
) -> Result<CommitSet> {
    let endpoint = Endpoint::compare(repo, &range.base_ref, &range.head_ref);
    let paged = source.fetch_paginated(&endpoint, policy).await?;

    let records = paged
        .items
        .into_iter()
        .map(|item| decode::<ApiCommit>(item, &endpoint.path).map(CommitRecord::from_api))
        .collect::<Result<Vec<_>>>()?;

    let fetched = records.len();
    let commits = dedup_commits(records);
    info!(
        "Collected {} unique commits for {} ({} entries fetched)",
        commits.len(),
        range,
        fetched
    );

    Ok(CommitSet {
        commits,
        total: paged.reported_total,
        truncated: paged.truncated,
    })
}
