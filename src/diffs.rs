//! File-change aggregation across a range
//!
//! Each commit's file list is fetched separately and folded into one record
//! per path with [`FileMerger`]. Line counts add up; the status follows the
//! last change except where the file's relation to the base ref says
//! otherwise (a file added in range stays added). Renames move the record to
//! the new path and remember where it started.

use crate::commits::CommitRecord;
use crate::error::Result;
use crate::github::models::{decode, ApiFile};
use crate::github::{Endpoint, GitHubSource, RepositoryRef, TruncationPolicy};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Net status of a path relative to the base ref
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl FileStatus {
    /// Map a GitHub file status onto the four tracked states.
    pub fn from_github(status: &str) -> Self {
        match status {
            "added" | "copied" => FileStatus::Added,
            "removed" => FileStatus::Removed,
            "renamed" => FileStatus::Renamed,
            _ => FileStatus::Modified,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Removed => write!(f, "removed"),
            FileStatus::Renamed => write!(f, "renamed"),
        }
    }
}

/// One path's net change over the range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChangeRecord {
    pub path: String,
    /// Path the file had before it was renamed in range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
}

impl FileChangeRecord {
    /// Lines added plus lines deleted
    pub fn churn(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// A single file entry from one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub previous_path: Option<String>,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
}

impl From<ApiFile> for FileChange {
    fn from(file: ApiFile) -> Self {
        Self {
            status: FileStatus::from_github(&file.status),
            path: file.filename,
            previous_path: file.previous_filename,
            additions: file.additions,
            deletions: file.deletions,
        }
    }
}

/// Folds per-commit file lists into one record per path.
///
/// Records keep the order in which their path was first seen.
#[derive(Debug, Default)]
pub struct FileMerger {
    slots: Vec<Option<FileChangeRecord>>,
    /// Per slot: the path existed at the base ref (its first change was not an add)
    at_base: Vec<bool>,
    index: HashMap<String, usize>,
}

impl FileMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one commit's change to the running state.
    pub fn apply(&mut self, change: FileChange) {
        if change.status == FileStatus::Renamed {
            if let Some(from) = change.previous_path.as_deref() {
                if from != change.path {
                    if let Some(slot) = self.index.remove(from) {
                        self.apply_rename(slot, change);
                        return;
                    }
                }
            }
        }

        match self.index.get(&change.path) {
            Some(&slot) => {
                let existed = self.at_base[slot];
                if let Some(record) = self.slots[slot].as_mut() {
                    record.additions += change.additions;
                    record.deletions += change.deletions;
                    record.status = merge_status(record.status, change.status, existed);
                    if record.previous_path.is_none() && change.status == FileStatus::Renamed {
                        record.previous_path = change.previous_path;
                    }
                }
            }
            None => {
                debug!("Tracking {} ({})", change.path, change.status);
                self.index.insert(change.path.clone(), self.slots.len());
                self.at_base.push(change.status != FileStatus::Added);
                self.slots.push(Some(FileChangeRecord {
                    path: change.path,
                    previous_path: change.previous_path,
                    status: change.status,
                    additions: change.additions,
                    deletions: change.deletions,
                }));
            }
        }
    }

    /// Move the record at `slot` to the rename target.
    fn apply_rename(&mut self, slot: usize, change: FileChange) {
        // A record already living at the target folds into the moved one.
        let displaced = self
            .index
            .remove(&change.path)
            .and_then(|other| self.slots[other].take());

        let existed = self.at_base[slot];
        let Some(record) = self.slots[slot].as_mut() else {
            return;
        };

        let origin = record
            .previous_path
            .take()
            .unwrap_or_else(|| record.path.clone());
        record.path = change.path.clone();
        record.additions += change.additions;
        record.deletions += change.deletions;
        if let Some(displaced) = displaced {
            record.additions += displaced.additions;
            record.deletions += displaced.deletions;
        }

        if origin == record.path {
            // Renamed back to where it started
            if record.status == FileStatus::Renamed {
                record.status = FileStatus::Modified;
            }
        } else {
            record.previous_path = Some(origin);
            record.status = merge_status(record.status, FileStatus::Renamed, existed);
        }

        self.index.insert(change.path, slot);
    }

    /// Apply every change of one commit.
    pub fn apply_all(&mut self, changes: impl IntoIterator<Item = FileChange>) {
        for change in changes {
            self.apply(change);
        }
    }

    /// Merged records in first-seen order
    pub fn finish(self) -> Vec<FileChangeRecord> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Status after `next` happens to a file currently in state `current`.
///
/// `existed_at_base` decides a re-add: a file deleted and recreated in range
/// is `Modified` if the base ref had it, `Added` otherwise.
fn merge_status(current: FileStatus, next: FileStatus, existed_at_base: bool) -> FileStatus {
    use FileStatus::*;
    match (current, next) {
        (_, Removed) => Removed,
        (Removed, Added) if existed_at_base => Modified,
        (Removed, Added) => Added,
        (Added, _) => Added,
        (Renamed, Modified) => Renamed,
        (_, next) => next,
    }
}

/// Merge per-commit file lists, given oldest commit first.
pub fn merge_file_changes(per_commit: impl IntoIterator<Item = Vec<FileChange>>) -> Vec<FileChangeRecord> {
    let mut merger = FileMerger::new();
    for changes in per_commit {
        merger.apply_all(changes);
    }
    merger.finish()
}

/// Merged file changes of a range
#[derive(Debug, Clone, Default)]
pub struct DiffSet {
    pub files: Vec<FileChangeRecord>,
    /// Some commit's file list was capped by GitHub and partial data was allowed
    pub truncated: bool,
}

/// Fetch every commit's file list and merge them by path.
pub async fn aggregate_diffs(
    source: &dyn GitHubSource,
    repo: &RepositoryRef,
    commits: &[CommitRecord],
    policy: TruncationPolicy,
) -> Result<DiffSet> {
    let mut merger = FileMerger::new();
    let mut truncated = false;

    for commit in commits {
        if commit.is_merge() {
            debug!(
                "Skipping merge commit {} ({} parents)",
                commit.short_sha(),
                commit.parent_count
            );
            continue;
        }
        let endpoint = Endpoint::commit_files(repo, &commit.sha);
        let paged = source.fetch_paginated(&endpoint, policy).await?;
        truncated |= paged.truncated;

        let changes = paged
            .items
            .into_iter()
            .map(|item| decode::<ApiFile>(item, &endpoint.path).map(FileChange::from))
            .collect::<Result<Vec<_>>>()?;
        debug!("Commit {} touched {} files", commit.short_sha(), changes.len());
        merger.apply_all(changes);
    }

    let files = merger.finish();
    info!(
        "Merged file changes of {} commits into {} paths",
        commits.len(),
        files.len()
    );

    Ok(DiffSet { files, truncated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::FixtureSource;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn change(path: &str, status: FileStatus, additions: u64, deletions: u64) -> FileChange {
        FileChange {
            path: path.to_string(),
            previous_path: None,
            status,
            additions,
            deletions,
        }
    }

    fn rename(from: &str, to: &str, additions: u64, deletions: u64) -> FileChange {
        FileChange {
            previous_path: Some(from.to_string()),
            ..change(to, FileStatus::Renamed, additions, deletions)
        }
    }

    #[test]
    fn test_added_then_modified_stays_added() {
        let files = merge_file_changes(vec![
            vec![change("src/x.py", FileStatus::Added, 10, 0)],
            vec![change("src/x.py", FileStatus::Modified, 4, 2)],
        ]);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/x.py");
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[0].additions, 14);
        assert_eq!(files[0].deletions, 2);
        assert_eq!(files[0].churn(), 16);
    }

    #[test]
    fn test_modified_then_removed_is_removed() {
        let files = merge_file_changes(vec![
            vec![change("a.rs", FileStatus::Modified, 1, 1)],
            vec![change("a.rs", FileStatus::Removed, 0, 30)],
        ]);
        assert_eq!(files[0].status, FileStatus::Removed);
        assert_eq!(files[0].deletions, 31);
    }

    #[test]
    fn test_removed_then_added_is_modified() {
        let files = merge_file_changes(vec![
            vec![change("a.rs", FileStatus::Removed, 0, 5)],
            vec![change("a.rs", FileStatus::Added, 6, 0)],
        ]);
        assert_eq!(files[0].status, FileStatus::Modified);
    }

    #[test]
    fn test_added_removed_readded_is_added() {
        let files = merge_file_changes(vec![
            vec![change("new.rs", FileStatus::Added, 10, 0)],
            vec![change("new.rs", FileStatus::Removed, 0, 10)],
            vec![change("new.rs", FileStatus::Added, 5, 0)],
        ]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!((files[0].additions, files[0].deletions), (15, 10));
    }

    #[test]
    fn test_modified_removed_readded_is_modified() {
        let files = merge_file_changes(vec![
            vec![change("lib.rs", FileStatus::Modified, 1, 1)],
            vec![change("lib.rs", FileStatus::Removed, 0, 40)],
            vec![change("lib.rs", FileStatus::Added, 38, 0)],
        ]);
        assert_eq!(files[0].status, FileStatus::Modified);
    }

    #[test]
    fn test_rename_then_edit_collapses() {
        let files = merge_file_changes(vec![
            vec![change("src/old.rs", FileStatus::Modified, 2, 1)],
            vec![rename("src/old.rs", "src/new.rs", 0, 0)],
            vec![change("src/new.rs", FileStatus::Modified, 5, 3)],
        ]);

        assert_eq!(files.len(), 1);
        let record = &files[0];
        assert_eq!(record.path, "src/new.rs");
        assert_eq!(record.previous_path.as_deref(), Some("src/old.rs"));
        assert_eq!(record.status, FileStatus::Renamed);
        assert_eq!((record.additions, record.deletions), (7, 4));
    }

    #[test]
    fn test_rename_chain_keeps_origin() {
        let files = merge_file_changes(vec![
            vec![rename("a.rs", "b.rs", 1, 0)],
            vec![rename("b.rs", "c.rs", 1, 0)],
        ]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "c.rs");
        assert_eq!(files[0].previous_path.as_deref(), Some("a.rs"));
        assert_eq!(files[0].additions, 2);
    }

    #[test]
    fn test_rename_back_to_origin_is_modified() {
        let files = merge_file_changes(vec![
            vec![rename("a.rs", "b.rs", 0, 0)],
            vec![rename("b.rs", "a.rs", 3, 0)],
        ]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "a.rs");
        assert_eq!(files[0].previous_path, None);
        assert_eq!(files[0].status, FileStatus::Modified);
    }

    #[test]
    fn test_added_then_renamed_stays_added() {
        let files = merge_file_changes(vec![
            vec![change("draft.md", FileStatus::Added, 20, 0)],
            vec![rename("draft.md", "docs/guide.md", 1, 1)],
        ]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "docs/guide.md");
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[0].previous_path.as_deref(), Some("draft.md"));
    }

    #[test]
    fn test_rename_onto_tracked_path_folds_it() {
        let files = merge_file_changes(vec![
            vec![
                change("a.rs", FileStatus::Modified, 1, 0),
                change("b.rs", FileStatus::Removed, 0, 9),
            ],
            vec![rename("a.rs", "b.rs", 0, 0)],
        ]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "b.rs");
        assert_eq!(files[0].previous_path.as_deref(), Some("a.rs"));
        assert_eq!((files[0].additions, files[0].deletions), (1, 9));
    }

    #[test]
    fn test_untracked_rename_keeps_github_previous_name() {
        let files = merge_file_changes(vec![vec![rename("lib/old.js", "lib/new.js", 0, 0)]]);
        assert_eq!(files[0].status, FileStatus::Renamed);
        assert_eq!(files[0].previous_path.as_deref(), Some("lib/old.js"));
    }

    #[test]
    fn test_first_seen_order() {
        let files = merge_file_changes(vec![
            vec![change("b", FileStatus::Modified, 1, 0)],
            vec![
                change("a", FileStatus::Modified, 1, 0),
                change("b", FileStatus::Modified, 1, 0),
            ],
        ]);
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["b", "a"]);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(FileStatus::from_github("copied"), FileStatus::Added);
        assert_eq!(FileStatus::from_github("changed"), FileStatus::Modified);
        assert_eq!(FileStatus::from_github("unchanged"), FileStatus::Modified);
        assert_eq!(FileStatus::from_github("removed"), FileStatus::Removed);
    }

    fn merge(sha: &str) -> CommitRecord {
        CommitRecord {
            parent_count: 2,
            ..commit(sha)
        }
    }

    fn commit(sha: &str) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            author: "a".to_string(),
            title: "t".to_string(),
            body: String::new(),
            date: None,
            pr_refs: BTreeSet::new(),
            parent_count: 1,
        }
    }

    #[tokio::test]
    async fn test_aggregate_diffs_fetches_each_commit() {
        let source = FixtureSource::new()
            .with_pages(
                "/repos/o/r/commits/c1",
                vec![json!({"sha": "c1", "files": [
                    {"filename": "src/x.py", "status": "added", "additions": 10, "deletions": 0}
                ]})],
            )
            .with_pages(
                "/repos/o/r/commits/c2",
                vec![json!({"sha": "c2", "files": [
                    {"filename": "src/x.py", "status": "modified", "additions": 3, "deletions": 1}
                ]})],
            );

        let diff = aggregate_diffs(
            &source,
            &RepositoryRef::new("o", "r"),
            &[commit("c1"), commit("c2")],
            TruncationPolicy::Fail,
        )
        .await
        .unwrap();

        assert_eq!(diff.files.len(), 1);
        assert_eq!(diff.files[0].status, FileStatus::Added);
        assert_eq!(diff.files[0].additions, 13);
        assert!(!diff.truncated);
        assert_eq!(
            source.requested(),
            vec!["/repos/o/r/commits/c1", "/repos/o/r/commits/c2"]
        );
    }

    #[tokio::test]
    async fn test_merge_commits_do_not_double_count() {
        let source = FixtureSource::new()
            .with_pages(
                "/repos/o/r/commits/c1",
                vec![json!({"sha": "c1", "files": [
                    {"filename": "x.rs", "status": "added", "additions": 10, "deletions": 0}
                ]})],
            )
            .with_pages(
                "/repos/o/r/commits/m1",
                vec![json!({"sha": "m1", "files": [
                    {"filename": "x.rs", "status": "added", "additions": 10, "deletions": 0}
                ]})],
            );

        let diff = aggregate_diffs(
            &source,
            &RepositoryRef::new("o", "r"),
            &[commit("c1"), merge("m1")],
            TruncationPolicy::Fail,
        )
        .await
        .unwrap();

        assert_eq!(diff.files.len(), 1);
        assert_eq!(diff.files[0].additions, 10);
        assert_eq!(source.requested(), vec!["/repos/o/r/commits/c1"]);
    }
}
