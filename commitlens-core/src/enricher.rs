//! Sequential per-commit enrichment: diff fetch, then model summary.
//!
//! One commit at a time, so there is never more than one outstanding model
//! call per run and progress lines arrive in completion order.

use anyhow::Context;

use crate::error::AnalysisError;
use crate::hosting::HostingApi;
use crate::model::ModelClient;
use crate::progress::ProgressReporter;
use crate::repo_ref::RepoRef;
use crate::summarizer::summarize_commit;
use crate::types::{CommitRef, CommitStats, EnrichedCommit};

/// Running totals across the enriched commits of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentTotals {
    pub files: usize,
    pub additions: u64,
    pub deletions: u64,
}

impl EnrichmentTotals {
    pub fn add(&mut self, commit: &EnrichedCommit) {
        self.files += commit.files.len();
        self.additions += commit.stats.additions;
        self.deletions += commit.stats.deletions;
    }
}

pub struct Enricher<'a> {
    pub hosting: &'a dyn HostingApi,
    pub model: &'a dyn ModelClient,
    pub model_name: &'a str,
    pub progress: &'a ProgressReporter,
}

impl Enricher<'_> {
    pub async fn enrich_all(
        &self,
        repo: &RepoRef,
        commits: Vec<CommitRef>,
    ) -> Result<(Vec<EnrichedCommit>, EnrichmentTotals), AnalysisError> {
        let total = commits.len();
        let mut totals = EnrichmentTotals::default();
        let mut enriched = Vec::with_capacity(total);

        for (index, commit) in commits.into_iter().enumerate() {
            let position = format!("({}/{})", index + 1, total);
            let commit = self.enrich_one(repo, commit, &position).await?;

            totals.add(&commit);
            enriched.push(commit);
        }

        Ok((enriched, totals))
    }

    async fn enrich_one(
        &self,
        repo: &RepoRef,
        commit: CommitRef,
        position: &str,
    ) -> Result<EnrichedCommit, AnalysisError> {
        self.progress
            .emit(format!(
                "{} Fetching diff for {} {}",
                position,
                commit.short_sha(),
                commit.title()
            ))
            .await;
        let detail = self.hosting.get_commit(repo, &commit.sha).await?;

        let stats = detail.stats.unwrap_or_else(|| CommitStats {
            additions: detail.files.iter().map(|f| f.additions).sum(),
            deletions: detail.files.iter().map(|f| f.deletions).sum(),
        });

        self.progress
            .emit(format!(
                "{} Summarizing {} ({} files, +{}/-{})",
                position,
                commit.short_sha(),
                detail.files.len(),
                stats.additions,
                stats.deletions
            ))
            .await;
        let ai = summarize_commit(self.model, self.model_name, repo, &commit, &detail.files)
            .await
            .with_context(|| format!("Failed to summarize commit {}", commit.short_sha()))?;

        Ok(EnrichedCommit {
            commit,
            files: detail.files,
            stats,
            ai,
        })
    }
}
