//! Period rollup: one narrative Markdown report over the whole run.

use anyhow::{Context, Result};
use tracing::warn;

use crate::model::{CompletionRequest, ModelClient};
use crate::repo_ref::RepoRef;
use crate::types::{Aggregate, EnrichedCommit};

/// Report used when the model returns nothing.
pub const EMPTY_ROLLUP: &str = "# Period Summary\n(No content)";

pub fn get_rollup_system_prompt() -> String {
    include_str!("../prompts/period_rollup.txt").to_string()
}

pub fn create_rollup_prompt(
    repo: &RepoRef,
    since: &str,
    until: &str,
    aggregate: &Aggregate,
    commits: &[EnrichedCommit],
) -> Result<String> {
    let stats = serde_json::to_string_pretty(aggregate)
        .context("Failed to serialize aggregate statistics")?;

    let mut prompt = format!(
        "Repository: {}\nPeriod: {} to {}\n\nAGGREGATE:\n{}\n\nCOMMITS ({}):\n",
        repo,
        since,
        until,
        stats,
        commits.len()
    );
    for enriched in commits {
        prompt.push_str(&format!(
            "- {}: {}\n",
            enriched.commit.short_sha(),
            enriched.ai.summary
        ));
    }

    Ok(prompt)
}

/// Generate the period report. The raw model text is the artifact; only
/// empty output is replaced.
pub async fn generate_rollup(
    model: &dyn ModelClient,
    model_name: &str,
    repo: &RepoRef,
    since: &str,
    until: &str,
    aggregate: &Aggregate,
    commits: &[EnrichedCommit],
) -> Result<String> {
    let request = CompletionRequest::for_model(
        model_name,
        get_rollup_system_prompt(),
        create_rollup_prompt(repo, since, until, aggregate, commits)?,
    );
    let text = model
        .complete(&request)
        .await
        .context("Failed to generate period rollup")?;

    if text.trim().is_empty() {
        warn!("Model returned an empty rollup for {}", repo);
        return Ok(EMPTY_ROLLUP.to_string());
    }
    Ok(text)
}
