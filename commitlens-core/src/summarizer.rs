//! Per-commit model summaries with a fixed fallback for unusable output.

use anyhow::Result;
use tracing::warn;

use crate::model::{CompletionRequest, ModelClient};
use crate::repo_ref::RepoRef;
use crate::types::{ChangeType, CommitRef, CommitSummary, FileChange, Risk};

/// Per-file patch budget in the prompt, in characters.
pub const MAX_PATCH_CHARS: usize = 4000;

pub const MAX_NOTABLE_FILES: usize = 3;

pub const FALLBACK_SUMMARY: &str = "Could not parse model output.";

pub fn get_commit_system_prompt() -> String {
    include_str!("../prompts/commit_summary.txt").to_string()
}

/// Longest prefix of `text` holding at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

pub fn create_commit_prompt(repo: &RepoRef, commit: &CommitRef, files: &[FileChange]) -> String {
    let date = commit
        .date
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());

    let mut prompt = format!(
        "Repository: {}\nCommit: {}\nAuthor: {}\nDate: {}\nTitle: {}\n",
        repo,
        commit.short_sha(),
        commit.author,
        date,
        commit.title()
    );

    prompt.push_str(&format!("\nFILES CHANGED ({}):\n", files.len()));
    for file in files {
        prompt.push_str(&format!(
            "- {} (+{}/-{})\n",
            file.filename, file.additions, file.deletions
        ));
    }

    prompt.push_str("\nDIFFS:\n");
    for file in files {
        let (patch, truncated) = truncate_chars(&file.patch, MAX_PATCH_CHARS);
        prompt.push_str(&format!("\n=== {} ({}) ===\n", file.filename, file.status));
        if patch.is_empty() {
            prompt.push_str("(no textual diff available)\n");
            continue;
        }
        prompt.push_str(patch);
        if truncated {
            prompt.push_str("\n... [diff truncated]");
        }
        prompt.push('\n');
    }

    prompt
}

/// Remove surrounding whitespace and a Markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse raw model text into a summary. Errors when the text is not a
/// JSON object of the expected shape.
pub fn parse_commit_summary(raw: &str) -> Result<CommitSummary, serde_json::Error> {
    let mut summary: CommitSummary = serde_json::from_str(strip_code_fence(raw))?;
    summary.notable_files.truncate(MAX_NOTABLE_FILES);
    Ok(summary)
}

/// The summary used whenever the model output cannot be parsed.
pub fn fallback_summary(files: &[FileChange]) -> CommitSummary {
    CommitSummary {
        summary: FALLBACK_SUMMARY.to_string(),
        change_type: ChangeType::Other,
        areas: Vec::new(),
        risk: Risk::Low,
        test_impact: "N/A".to_string(),
        notable_files: files
            .iter()
            .take(MAX_NOTABLE_FILES)
            .map(|f| f.filename.clone())
            .collect(),
    }
}

pub fn summary_or_fallback(raw: &str, commit: &CommitRef, files: &[FileChange]) -> CommitSummary {
    match parse_commit_summary(raw) {
        Ok(summary) => summary,
        Err(e) => {
            warn!(
                "Unparseable summary for {} ({}), using fallback",
                commit.short_sha(),
                e
            );
            fallback_summary(files)
        }
    }
}

/// Ask the model to classify one commit.
///
/// Transport failures propagate; malformed output never does.
pub async fn summarize_commit(
    model: &dyn ModelClient,
    model_name: &str,
    repo: &RepoRef,
    commit: &CommitRef,
    files: &[FileChange],
) -> Result<CommitSummary> {
    let request = CompletionRequest::for_model(
        model_name,
        get_commit_system_prompt(),
        create_commit_prompt(repo, commit, files),
    );
    let raw = model.complete(&request).await?;
    Ok(summary_or_fallback(&raw, commit, files))
}
