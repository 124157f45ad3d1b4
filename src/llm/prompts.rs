//! Prompt templates for changelog generation.
//!
//! The system block is fixed; the user block lists the payload's commits and
//! files and asks for a sectioned Markdown changelog.

use crate::commits::CommitRecord;
use crate::diffs::FileChangeRecord;
use crate::payload::ChangelogPayload;

const SYSTEM_PROMPT: &str = "\
You are a skilled technical writer specializing in changelog generation.
Your task is to create a clear, well-organized changelog from Git commit history.
Follow these guidelines:
1. Group related changes into categories (e.g., Features, Bug Fixes, Documentation)
2. Use clear, concise language
3. Maintain a professional tone
4. Highlight breaking changes or important updates
5. Include relevant PR/Issue numbers if mentioned in commits
6. Summarize technical changes in user-friendly terms";

/// Sections requested from the model, in order
pub const SECTIONS: &[(&str, &str)] = &[
    ("Summary", "brief overview of major changes"),
    ("Breaking Changes", "if any"),
    ("Features", ""),
    ("Bug Fixes", ""),
    ("Performance Improvements", ""),
    ("Documentation", ""),
    ("Other Changes", ""),
];

/// Prompt split into its two fixed roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Render the system and user blocks for a payload.
pub fn render_prompt(payload: &ChangelogPayload) -> RenderedPrompt {
    let mut user = format!(
        "Generate a changelog for {} from {} to {}.\n\n",
        payload.repo, payload.range.base_ref, payload.range.head_ref
    );

    user.push_str("Commit History:\n");
    user.push_str(&commit_lines(&payload.commits));
    user.push_str("\n\nFiles Changed:\n");
    user.push_str(&file_lines(&payload.files));
    user.push_str("\n\n");

    if let Some(note) = truncation_note(payload) {
        user.push_str(&note);
        user.push_str("\n\n");
    }

    user.push_str("Format the changelog with the following sections:\n");
    for (section, hint) in SECTIONS {
        if hint.is_empty() {
            user.push_str(&format!("- {}\n", section));
        } else {
            user.push_str(&format!("- {} ({})\n", section, hint));
        }
    }
    user.push_str("\nFocus on user-facing changes and their impact.");

    RenderedPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Document written when the model could not be reached: the error followed
/// by the raw commit and file lists.
pub fn render_fallback(payload: &ChangelogPayload, error: &str) -> String {
    format!(
        "Failed to generate changelog due to an error: {}\n\n\
         Raw commit data has been included below:\n\n\
         # Commits between {} and {}\n\n{}\n\n\
         # Files Changed\n\n{}\n",
        error,
        payload.range.base_ref,
        payload.range.head_ref,
        commit_lines(&payload.commits),
        file_lines(&payload.files)
    )
}

fn commit_lines(commits: &[CommitRecord]) -> String {
    if commits.is_empty() {
        return "(no commits)".to_string();
    }
    commits.iter().map(commit_line).collect::<Vec<_>>().join("\n")
}

fn commit_line(commit: &CommitRecord) -> String {
    let mut line = format!(
        "- {} {} (by {})",
        commit.short_sha(),
        commit.title,
        commit.author
    );
    if !commit.pr_refs.is_empty() {
        let refs: Vec<String> = commit.pr_refs.iter().map(|n| format!("#{}", n)).collect();
        line.push_str(&format!(" [{}]", refs.join(", ")));
    }
    line
}

fn file_lines(files: &[FileChangeRecord]) -> String {
    if files.is_empty() {
        return "(no files)".to_string();
    }
    files.iter().map(file_line).collect::<Vec<_>>().join("\n")
}

fn file_line(file: &FileChangeRecord) -> String {
    let path = match &file.previous_path {
        Some(previous) => format!("{} -> {}", previous, file.path),
        None => file.path.clone(),
    };
    format!(
        "- {}: {} (+{}/-{})",
        path, file.status, file.additions, file.deletions
    )
}

fn truncation_note(payload: &ChangelogPayload) -> Option<String> {
    let truncation = &payload.truncation;
    if !truncation.is_truncated() {
        return None;
    }

    let mut notes = Vec::new();
    if truncation.upstream {
        notes.push("GitHub truncated this comparison, so some changes are missing".to_string());
    }
    if truncation.commits_dropped > 0 {
        notes.push(format!(
            "showing {} of {} commits",
            payload.commits.len(),
            payload.total_commits
        ));
    }
    if truncation.files_dropped > 0 {
        notes.push(format!(
            "showing the {} most changed of {} files",
            payload.files.len(),
            payload.total_files
        ));
    }
    Some(format!("Note: the data below is incomplete ({}).", notes.join("; ")))
}
