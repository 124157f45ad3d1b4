//! End-to-end changelog pipeline
//!
//! resolve range → commits → per-commit diffs → payload → prompt → LLM.
//! Every step runs sequentially against a [`GitHubSource`], so tests can swap
//! the HTTP client for fixtures without touching this module.

use crate::commits::aggregate_commits;
use crate::diffs::aggregate_diffs;
use crate::error::Result;
use crate::github::{GitHubSource, RepositoryRef, TruncationPolicy};
use crate::llm::prompts::{render_fallback, render_prompt};
use crate::llm::LLMProvider;
use crate::payload::{build_payload, ChangelogPayload, PayloadLimits};
use crate::range::{resolve_range, RangeSpec};
use tracing::{info, warn};

/// Fetch everything needed for a range and assemble the payload.
pub async fn collect_payload(
    source: &dyn GitHubSource,
    repo: &RepositoryRef,
    spec: &RangeSpec,
    limits: PayloadLimits,
    policy: TruncationPolicy,
) -> Result<ChangelogPayload> {
    let range = resolve_range(source, repo, spec).await?;
    info!("Resolved range {} for {}", range, repo);

    let commits = aggregate_commits(source, repo, &range, policy).await?;
    let diffs = aggregate_diffs(source, repo, &commits.commits, policy).await?;
    let upstream_truncated = commits.truncated || diffs.truncated;

    let payload = build_payload(
        repo.clone(),
        range,
        commits.commits,
        diffs.files,
        limits,
        upstream_truncated,
    );

    if payload.truncation.is_truncated() {
        warn!(
            "Payload truncated: upstream={}, {} commits and {} files dropped",
            payload.truncation.upstream,
            payload.truncation.commits_dropped,
            payload.truncation.files_dropped
        );
    }

    Ok(payload)
}

/// Ask the provider for a changelog.
///
/// A failed LLM call does not fail the run: the returned document is the raw
/// data with the error on top, and `used_fallback` is set.
pub async fn generate_changelog(
    provider: &dyn LLMProvider,
    payload: &ChangelogPayload,
) -> GeneratedChangelog {
    let prompt = render_prompt(payload);
    match provider.query(&prompt.system, &prompt.user).await {
        Ok(text) => {
            info!("{} returned {} chars", provider.name(), text.len());
            GeneratedChangelog {
                text,
                used_fallback: false,
            }
        }
        Err(e) => {
            warn!("LLM generation failed, writing raw data instead: {}", e.context());
            GeneratedChangelog {
                text: render_fallback(payload, &e.to_string()),
                used_fallback: true,
            }
        }
    }
}

/// Text to write and how it was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedChangelog {
    pub text: String,
    pub used_fallback: bool,
}
