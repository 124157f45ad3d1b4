//! Commit range specification and resolution
//!
//! A range is given either as two tags or as "since tag" plus an optional
//! branch. Resolution only proves that both endpoints exist; enumerating the
//! commits between them is the commit aggregator's job.

use crate::error::{Error, GitHubError, RangeError, Result};
use crate::github::models::{decode, RepositoryInfo};
use crate::github::{GitHubSource, RepositoryRef};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// User-supplied range, exactly one form per invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    Tags { from_tag: String, to_tag: String },
    Since { since_tag: String, branch: Option<String> },
}

impl RangeSpec {
    /// Build a spec from the four optional CLI values.
    pub fn from_parts(
        from_tag: Option<String>,
        to_tag: Option<String>,
        since_tag: Option<String>,
        branch: Option<String>,
    ) -> Result<Self> {
        let invalid =
            |msg: &str| -> Result<Self> { Err(Error::Range(RangeError::Invalid(msg.to_string()))) };

        match (from_tag, to_tag, since_tag) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => {
                invalid("use only one of --since-tag or --from-tag/--to-tag")
            }
            (Some(from_tag), Some(to_tag), None) => Ok(RangeSpec::Tags { from_tag, to_tag }),
            (Some(_), None, None) => invalid("--from-tag requires --to-tag"),
            (None, Some(_), None) => invalid("--to-tag requires --from-tag"),
            (None, None, Some(since_tag)) => Ok(RangeSpec::Since { since_tag, branch }),
            (None, None, None) => {
                invalid("specify a range with --since-tag or --from-tag/--to-tag")
            }
        }
    }
}

/// Endpoints verified to exist in the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRange {
    pub base_ref: String,
    pub head_ref: String,
}

impl fmt::Display for ResolvedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}...{}", self.base_ref, self.head_ref)
    }
}

/// Resolve a range spec against the repository.
pub async fn resolve_range(
    source: &dyn GitHubSource,
    repo: &RepositoryRef,
    spec: &RangeSpec,
) -> Result<ResolvedRange> {
    let (base_ref, head_ref) = match spec {
        RangeSpec::Tags { from_tag, to_tag } => (from_tag.clone(), to_tag.clone()),
        RangeSpec::Since { since_tag, branch } => {
            let head = match branch {
                Some(branch) => branch.clone(),
                None => default_branch(source, repo).await?,
            };
            (since_tag.clone(), head)
        }
    };

    ensure_ref_exists(source, repo, &base_ref).await?;
    ensure_ref_exists(source, repo, &head_ref).await?;

    let range = ResolvedRange { base_ref, head_ref };
    info!("Resolved range {} in {}", range, repo);
    Ok(range)
}

/// The repository's default branch
pub async fn default_branch(source: &dyn GitHubSource, repo: &RepositoryRef) -> Result<String> {
    let path = repo.api_path();
    let info: RepositoryInfo = decode(source.fetch_one(&path).await?, &path)?;
    let branch = info
        .default_branch
        .filter(|b| !b.is_empty())
        .ok_or_else(|| Error::GitHub(GitHubError::MissingDefaultBranch(repo.to_string())))?;
    debug!("Default branch of {} is {}", repo, branch);
    Ok(branch)
}

/// Confirm that a tag, branch or sha names a commit.
async fn ensure_ref_exists(
    source: &dyn GitHubSource,
    repo: &RepositoryRef,
    reference: &str,
) -> Result<()> {
    let path = format!("{}/commits/{}", repo.api_path(), reference);
    match source.fetch_one(&path).await {
        Ok(_) => Ok(()),
        Err(Error::GitHub(GitHubError::UpstreamClient { status, .. }))
            if status == 404 || status == 422 =>
        {
            Err(Error::Range(RangeError::RefNotFound {
                reference: reference.to_string(),
            }))
        }
        Err(e) => Err(e),
    }
}
