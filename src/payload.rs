//! Prompt payload assembly
//!
//! Orders commits newest first and files by churn, then applies the size
//! ceiling. Anything dropped by the ceiling is counted in [`Truncation`].

use crate::commits::CommitRecord;
use crate::config::PayloadConfig;
use crate::diffs::FileChangeRecord;
use crate::github::RepositoryRef;
use crate::range::ResolvedRange;
use serde::Serialize;

/// Maximum number of commits and files handed to the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    pub max_commits: usize,
    pub max_files: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        PayloadConfig::default().into()
    }
}

impl From<PayloadConfig> for PayloadLimits {
    fn from(config: PayloadConfig) -> Self {
        Self {
            max_commits: config.max_commits,
            max_files: config.max_files,
        }
    }
}

/// What was left out of the payload and why
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Truncation {
    /// GitHub capped the comparison and partial data was accepted
    pub upstream: bool,
    /// Commits dropped by the size ceiling
    pub commits_dropped: usize,
    /// Files dropped by the size ceiling
    pub files_dropped: usize,
}

impl Truncation {
    pub fn is_truncated(&self) -> bool {
        self.upstream || self.commits_dropped > 0 || self.files_dropped > 0
    }
}

/// Everything the prompt templates need about one range
#[derive(Debug, Clone, Serialize)]
pub struct ChangelogPayload {
    pub repo: RepositoryRef,
    pub range: ResolvedRange,
    /// Unique commits before the ceiling was applied
    pub total_commits: usize,
    /// Unique files before the ceiling was applied
    pub total_files: usize,
    /// Newest first
    pub commits: Vec<CommitRecord>,
    /// Highest churn first
    pub files: Vec<FileChangeRecord>,
    pub truncation: Truncation,
}

/// Build the payload. Total over any input, including empty sequences.
///
/// `commits` is expected in fetch order (oldest first).
pub fn build_payload(
    repo: RepositoryRef,
    range: ResolvedRange,
    commits: Vec<CommitRecord>,
    files: Vec<FileChangeRecord>,
    limits: PayloadLimits,
    upstream_truncated: bool,
) -> ChangelogPayload {
    let total_commits = commits.len();
    let total_files = files.len();

    let mut commits = commits;
    commits.reverse();
    commits.truncate(limits.max_commits);

    let mut files = files;
    files.sort_by(|a, b| b.churn().cmp(&a.churn()).then_with(|| a.path.cmp(&b.path)));
    files.truncate(limits.max_files);

    let truncation = Truncation {
        upstream: upstream_truncated,
        commits_dropped: total_commits - commits.len(),
        files_dropped: total_files - files.len(),
    };

    ChangelogPayload {
        repo,
        range,
        total_commits,
        total_files,
        commits,
        files,
        truncation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diffs::FileStatus;
    use std::collections::BTreeSet;

    fn repo() -> RepositoryRef {
        RepositoryRef::new("owner", "repo")
    }

    fn range() -> ResolvedRange {
        ResolvedRange {
            base_ref: "v1.0.0".to_string(),
            head_ref: "v1.1.0".to_string(),
        }
    }

    fn commit(sha: &str) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            author: "dev".to_string(),
            title: format!("commit {}", sha),
            body: String::new(),
            date: None,
            pr_refs: BTreeSet::new(),
            parent_count: 1,
        }
    }

    fn file(path: &str, additions: u64, deletions: u64) -> FileChangeRecord {
        FileChangeRecord {
            path: path.to_string(),
            previous_path: None,
            status: FileStatus::Modified,
            additions,
            deletions,
        }
    }

    #[test]
    fn test_empty_input_is_well_formed() {
        let payload = build_payload(repo(), range(), vec![], vec![], PayloadLimits::default(), false);
        assert!(payload.commits.is_empty());
        assert!(payload.files.is_empty());
        assert_eq!(payload.total_commits, 0);
        assert!(!payload.truncation.is_truncated());
    }

    #[test]
    fn test_commits_newest_first() {
        let payload = build_payload(
            repo(),
            range(),
            vec![commit("old"), commit("mid"), commit("new")],
            vec![],
            PayloadLimits::default(),
            false,
        );
        let shas: Vec<_> = payload.commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_files_by_churn_then_path() {
        let payload = build_payload(
            repo(),
            range(),
            vec![],
            vec![file("b.rs", 1, 1), file("big.rs", 100, 3), file("a.rs", 2, 0)],
            PayloadLimits::default(),
            false,
        );
        let paths: Vec<_> = payload.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["big.rs", "a.rs", "b.rs"]);
    }

    #[test]
    fn test_ceiling_records_truncation() {
        let limits = PayloadLimits {
            max_commits: 2,
            max_files: 1,
        };
        let payload = build_payload(
            repo(),
            range(),
            vec![commit("1"), commit("2"), commit("3")],
            vec![file("small", 1, 0), file("large", 50, 50)],
            limits,
            false,
        );

        assert_eq!(payload.commits.len(), 2);
        assert_eq!(payload.commits[0].sha, "3");
        assert_eq!(payload.files.len(), 1);
        assert_eq!(payload.files[0].path, "large");
        assert_eq!(payload.total_commits, 3);
        assert_eq!(payload.total_files, 2);
        assert_eq!(payload.truncation.commits_dropped, 1);
        assert_eq!(payload.truncation.files_dropped, 1);
        assert!(payload.truncation.is_truncated());
    }

    #[test]
    fn test_upstream_flag_carried() {
        let payload = build_payload(repo(), range(), vec![], vec![], PayloadLimits::default(), true);
        assert!(payload.truncation.upstream);
        assert!(payload.truncation.is_truncated());
    }

    #[test]
    fn test_serializes_for_json_output() {
        let payload = build_payload(
            repo(),
            range(),
            vec![commit("abc")],
            vec![file("x", 1, 0)],
            PayloadLimits::default(),
            false,
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["repo"]["owner"], "owner");
        assert_eq!(value["range"]["base_ref"], "v1.0.0");
        assert_eq!(value["files"][0]["status"], "modified");
        assert!(value["files"][0].get("previous_path").is_none());
    }
}
