//! Changelog file naming and writing.

use crate::error::{Error, IoError, Result};
use crate::github::RepositoryRef;
use crate::range::RangeSpec;
use std::fs;
use std::path::Path;

/// Characters dropped from filename components
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '\\', '|', '?', '*'];

/// Default output filename for a repository and the range as the user gave it.
///
/// `owner/repo` with `v1.6.0` → `v1.7.0` becomes `owner-repo_v1.6.0_to_v1.7.0.md`;
/// a since-range becomes `owner-repo_since_v1.7.0.md`.
pub fn default_output_name(repo: &RepositoryRef, spec: &RangeSpec) -> String {
    let repo_part = sanitize(&repo.to_string());
    match spec {
        RangeSpec::Tags { from_tag, to_tag } => format!(
            "{}_{}_to_{}.md",
            repo_part,
            sanitize(from_tag),
            sanitize(to_tag)
        ),
        RangeSpec::Since { since_tag, .. } => {
            format!("{}_since_{}.md", repo_part, sanitize(since_tag))
        }
    }
}

/// Replace path separators with hyphens and drop characters unsafe in filenames.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c))
        .map(|c| if c == '/' { '-' } else { c })
        .collect()
}

/// Write the changelog in one call.
pub fn write_changelog(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|source| {
        Error::Io(IoError::FileWriteFailed {
            path: path.display().to_string(),
            source,
        })
    })
}
