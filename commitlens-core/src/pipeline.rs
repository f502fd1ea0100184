//! The analysis orchestrator.
//!
//! `Validating -> Collecting -> Enriching -> Aggregating -> Summarizing ->
//! Done`, or `Failed` from any stage. Every transition is narrated on the
//! run's progress channel, and the channel is completed on both exits.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::collector::{collect_commits, BranchSelector, CollectOptions};
use crate::enricher::Enricher;
use crate::error::AnalysisError;
use crate::hosting::HostingApi;
use crate::model::ModelClient;
use crate::progress::{ProgressRegistry, ProgressReporter};
use crate::repo_ref::RepoRef;
use crate::rollup::generate_rollup;
use crate::types::{Aggregate, AnalysisReport};

pub const DEFAULT_MAX_COMMITS: usize = 60;

fn default_max_commits() -> usize {
    DEFAULT_MAX_COMMITS
}

/// An analysis request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub since: String,
    #[serde(default)]
    pub until: String,
    /// Branch name, the any-branch token, or absent for the default branch.
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub include_merges: bool,
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl AnalysisRequest {
    pub fn new(repo: &str, since: &str, until: &str) -> Self {
        Self {
            repo: repo.to_string(),
            since: since.to_string(),
            until: until.to_string(),
            branch: None,
            include_merges: false,
            max_commits: DEFAULT_MAX_COMMITS,
            request_id: None,
        }
    }

    /// Check the request and resolve it into a repository and collection
    /// options. Makes no upstream calls.
    pub fn validate(&self) -> Result<(RepoRef, CollectOptions), AnalysisError> {
        let missing: Vec<&str> = [
            ("repo", &self.repo),
            ("since", &self.since),
            ("until", &self.until),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(AnalysisError::invalid_input(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        check_timestamp("since", &self.since)?;
        check_timestamp("until", &self.until)?;
        if self.max_commits == 0 {
            return Err(AnalysisError::invalid_input("maxCommits must be at least 1"));
        }

        let repo = RepoRef::parse(&self.repo)?;
        let options = CollectOptions {
            since: self.since.trim().to_string(),
            until: self.until.trim().to_string(),
            branch: BranchSelector::from_request(self.branch.as_deref()),
            include_merges: self.include_merges,
            max_commits: self.max_commits,
        };
        Ok((repo, options))
    }
}

/// Accepts RFC 3339 timestamps, ISO-8601 date-times without an offset,
/// and bare `YYYY-MM-DD` dates.
fn check_timestamp(field: &str, value: &str) -> Result<(), AnalysisError> {
    let value = value.trim();
    let valid = DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
    if valid {
        Ok(())
    } else {
        Err(AnalysisError::invalid_input(format!(
            "{} is not an ISO-8601 timestamp: {:?}",
            field, value
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Validating,
    Collecting { repo: String },
    Enriching { total: usize },
    Aggregating,
    Summarizing,
    Done { elapsed: Duration },
    Failed { message: String },
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => write!(f, "Validating request"),
            Self::Collecting { repo } => write!(f, "Collecting commits from {}", repo),
            Self::Enriching { total } => write!(f, "Enriching {} commits", total),
            Self::Aggregating => write!(f, "Aggregating statistics"),
            Self::Summarizing => write!(f, "Generating period summary"),
            Self::Done { elapsed } => write!(f, "Done in {:.1}s", elapsed.as_secs_f64()),
            Self::Failed { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Runs analyses against shared collaborators. Cheap to share across
/// concurrent runs; each `analyze` call owns its own working state.
pub struct Analyzer {
    hosting: Arc<dyn HostingApi>,
    model: Arc<dyn ModelClient>,
    registry: Arc<ProgressRegistry>,
    model_name: String,
}

impl Analyzer {
    pub fn new(
        hosting: Arc<dyn HostingApi>,
        model: Arc<dyn ModelClient>,
        registry: Arc<ProgressRegistry>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            hosting,
            model,
            registry,
            model_name: model_name.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.registry
    }

    pub fn hosting(&self) -> &dyn HostingApi {
        self.hosting.as_ref()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        let progress = ProgressReporter::new(self.registry.clone(), request.request_id.clone());
        let started = Instant::now();

        let result = self.run(&request, &progress).await;

        match &result {
            Ok(report) => {
                info!(
                    "Analysis of {} finished: {} commits",
                    report.repo, report.aggregate.count
                );
                let elapsed = started.elapsed();
                enter(&progress, PipelineStage::Done { elapsed }).await;
            }
            Err(err) => {
                error!("Analysis of {} failed: {}", request.repo, err);
                let message = err.to_string();
                enter(&progress, PipelineStage::Failed { message }).await;
            }
        }
        progress.complete().await;

        result
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        progress: &ProgressReporter,
    ) -> Result<AnalysisReport, AnalysisError> {
        enter(progress, PipelineStage::Validating).await;
        let (repo, options) = request.validate()?;

        enter(
            progress,
            PipelineStage::Collecting {
                repo: repo.to_string(),
            },
        )
        .await;
        let commits = collect_commits(self.hosting.as_ref(), progress, &repo, &options).await?;

        enter(
            progress,
            PipelineStage::Enriching {
                total: commits.len(),
            },
        )
        .await;
        let enricher = Enricher {
            hosting: self.hosting.as_ref(),
            model: self.model.as_ref(),
            model_name: &self.model_name,
            progress,
        };
        let (enriched, totals) = enricher.enrich_all(&repo, commits).await?;
        debug!(
            "Enriched {} commits: {} files, +{}/-{}",
            enriched.len(),
            totals.files,
            totals.additions,
            totals.deletions
        );

        enter(progress, PipelineStage::Aggregating).await;
        let aggregate = Aggregate::from_enrichment(&enriched, totals);

        enter(progress, PipelineStage::Summarizing).await;
        let rollup = generate_rollup(
            self.model.as_ref(),
            &self.model_name,
            &repo,
            &options.since,
            &options.until,
            &aggregate,
            &enriched,
        )
        .await?;

        Ok(AnalysisReport {
            repo: repo.to_string(),
            since: request.since.clone(),
            until: request.until.clone(),
            rollup,
            commits: enriched,
            aggregate,
        })
    }
}

async fn enter(progress: &ProgressReporter, stage: PipelineStage) {
    debug!(stage = ?stage, "Pipeline transition");
    progress.emit(stage.to_string()).await;
}
