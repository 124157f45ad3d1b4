//! Changelog command: fetches a range from GitHub, asks the LLM for a
//! changelog and writes it to disk.
//!
//! The output file is written last, so an interrupted or failed run never
//! leaves a partial changelog behind.

use crate::config::Config;
use crate::error::Error;
use crate::github::client::GitHubClient;
use crate::github::{RepositoryRef, TruncationPolicy};
use crate::llm::provider_from_config;
use crate::output::{default_output_name, write_changelog};
use crate::payload::PayloadLimits;
use crate::pipeline::{collect_payload, generate_changelog};
use crate::range::RangeSpec;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{info, warn};

/// Inputs of one changelog run, already parsed from the command line
#[derive(Debug, Clone, Default)]
pub struct ChangelogArgs {
    pub repository: String,
    pub from_tag: Option<String>,
    pub to_tag: Option<String>,
    pub since_tag: Option<String>,
    pub branch: Option<String>,
    pub output: Option<PathBuf>,
    pub token: Option<String>,
    pub config: Option<PathBuf>,
    pub provider: Option<String>,
    pub allow_partial: bool,
    pub json: bool,
}

/// Run the changelog command.
///
/// With `json` set, the payload is printed to stdout and no LLM is called.
/// Otherwise returns the path of the written file.
pub async fn changelog_command(args: ChangelogArgs) -> Result<Option<PathBuf>> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(provider) = &args.provider {
        config.llm.provider = provider.clone();
    }

    let repo = RepositoryRef::parse(&args.repository)?;
    let spec = RangeSpec::from_parts(
        args.from_tag.clone(),
        args.to_tag.clone(),
        args.since_tag.clone(),
        args.branch.clone(),
    )?;
    if args.branch.is_some() && matches!(spec, RangeSpec::Tags { .. }) {
        warn!("--branch only applies to --since-tag ranges and is ignored");
    }

    let token = args.token.clone().filter(|t| !t.trim().is_empty());
    if token.is_none() {
        warn!("No GitHub token provided; API rate limits will be very restrictive");
        eprintln!("Warning: no GitHub token (set GITHUB_TOKEN or pass --token); rate limits are low.");
    }

    let policy = if args.allow_partial {
        TruncationPolicy::Allow
    } else {
        TruncationPolicy::Fail
    };

    // Resolved before any request is made
    let provider = if args.json {
        None
    } else {
        Some(provider_from_config(&config.llm)?)
    };

    let client = GitHubClient::new(config.github.clone(), token)?;

    let pb = spinner(&format!("Fetching changes for {}...", repo));
    let payload = match collect_payload(
        &client,
        &repo,
        &spec,
        PayloadLimits::from(config.payload.clone()),
        policy,
    )
    .await
    {
        Ok(payload) => payload,
        Err(e) => {
            pb.finish_and_clear();
            let hint = failure_hint(&e);
            return Err(e)
                .with_context(|| format!("Failed to collect changes for {} ({})", repo, hint));
        }
    };
    pb.finish_with_message(format!(
        "Found {} commits and {} changed files ({})",
        payload.total_commits, payload.total_files, payload.range
    ));

    let Some(provider) = provider else {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(None);
    };

    let pb = spinner(&format!("Generating changelog with {}...", provider.name()));
    let generated = generate_changelog(provider.as_ref(), &payload).await;
    if generated.used_fallback {
        pb.finish_with_message("LLM generation failed; writing raw change data instead");
    } else {
        pb.finish_with_message("Changelog generated");
    }

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_output_name(&repo, &spec)));
    write_changelog(&path, &generated.text)?;
    info!("Wrote {} bytes to {}", generated.text.len(), path.display());

    Ok(Some(path))
}

/// What the user can do about a failed collection
fn failure_hint(error: &Error) -> &'static str {
    if error.is_fatal() {
        "check the repository, range and token; retrying will not help"
    } else if error.is_retryable() {
        "GitHub may be busy; try again later"
    } else {
        "see the error below"
    }
}

/// Create a spinner with a message
fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
