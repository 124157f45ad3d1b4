//! Generate Markdown changelogs for a GitHub repository range.
//!
//! Commits and per-commit file changes between two refs are fetched from the
//! GitHub REST API, deduplicated and merged, then handed to an LLM CLI that
//! writes the changelog.

pub mod commands;
pub mod commits;
pub mod config;
pub mod diffs;
pub mod error;
pub mod github;
pub mod llm;
pub mod output;
pub mod payload;
pub mod pipeline;
pub mod range;

pub use error::{Error, Result};
