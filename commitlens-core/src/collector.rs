//! Resolves a branch-selection policy into an ordered, deduplicated and
//! capped list of commits inside a date window.

use std::collections::HashSet;

use crate::error::AnalysisError;
use crate::hosting::{CommitQuery, HostingApi, ListedCommit};
use crate::progress::ProgressReporter;
use crate::repo_ref::RepoRef;
use crate::types::CommitRef;

/// Branch token that selects every branch of the repository.
pub const ANY_BRANCH: &str = "__ANY__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSelector {
    /// The repository's default branch.
    Default,
    Named(String),
    /// Every branch, deduplicated by sha.
    Any,
}

impl BranchSelector {
    pub fn from_request(branch: Option<&str>) -> Self {
        match branch.map(str::trim) {
            None | Some("") => Self::Default,
            Some(ANY_BRANCH) => Self::Any,
            Some(name) => Self::Named(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectOptions {
    pub since: String,
    pub until: String,
    pub branch: BranchSelector,
    pub include_merges: bool,
    pub max_commits: usize,
}

impl CollectOptions {
    fn query(&self, branch: &str) -> CommitQuery {
        CommitQuery {
            branch: branch.to_string(),
            since: self.since.clone(),
            until: self.until.clone(),
        }
    }

    fn keeps(&self, commit: &ListedCommit) -> bool {
        self.include_merges || !commit.is_merge()
    }
}

pub async fn collect_commits(
    hosting: &dyn HostingApi,
    progress: &ProgressReporter,
    repo: &RepoRef,
    options: &CollectOptions,
) -> Result<Vec<CommitRef>, AnalysisError> {
    let commits = match &options.branch {
        BranchSelector::Named(branch) => {
            collect_branch(hosting, progress, repo, options, branch).await?
        }
        BranchSelector::Default => {
            let metadata = hosting.get_repository(repo).await?;
            progress
                .emit(format!(
                    "Using default branch {} of {}",
                    metadata.default_branch, repo
                ))
                .await;
            collect_branch(hosting, progress, repo, options, &metadata.default_branch).await?
        }
        BranchSelector::Any => collect_any_branch(hosting, progress, repo, options).await?,
    };

    progress
        .emit(format!("Collected {} commits", commits.len()))
        .await;
    Ok(commits)
}

async fn collect_branch(
    hosting: &dyn HostingApi,
    progress: &ProgressReporter,
    repo: &RepoRef,
    options: &CollectOptions,
    branch: &str,
) -> Result<Vec<CommitRef>, AnalysisError> {
    progress
        .emit(format!("Listing commits on {} of {}", branch, repo))
        .await;

    let listed = hosting.list_commits(repo, &options.query(branch)).await?;
    let total = listed.len();
    let commits: Vec<CommitRef> = listed
        .into_iter()
        .filter(|c| options.keeps(c))
        .take(options.max_commits)
        .map(|c| c.commit)
        .collect();

    progress
        .emit(format!(
            "Branch {}: {} commits in window, {} selected",
            branch,
            total,
            commits.len()
        ))
        .await;
    Ok(commits)
}

async fn collect_any_branch(
    hosting: &dyn HostingApi,
    progress: &ProgressReporter,
    repo: &RepoRef,
    options: &CollectOptions,
) -> Result<Vec<CommitRef>, AnalysisError> {
    progress
        .emit(format!("Enumerating branches of {}", repo))
        .await;
    let branches = hosting.list_branches(repo).await?;
    progress
        .emit(format!("Found {} branches", branches.len()))
        .await;

    let mut seen: HashSet<String> = HashSet::new();
    let mut commits: Vec<CommitRef> = Vec::new();

    for branch in &branches {
        if commits.len() >= options.max_commits {
            break;
        }

        progress
            .emit(format!("Listing commits on {}", branch))
            .await;
        let listed = hosting.list_commits(repo, &options.query(branch)).await?;

        let before = commits.len();
        for candidate in listed.into_iter().filter(|c| options.keeps(c)) {
            if commits.len() >= options.max_commits {
                break;
            }
            if seen.insert(candidate.commit.sha.clone()) {
                commits.push(candidate.commit);
            }
        }

        progress
            .emit(format!(
                "Branch {}: {} new commits ({} unique so far)",
                branch,
                commits.len() - before,
                commits.len()
            ))
            .await;
    }

    // Newest first; undated commits sort last
    commits.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(commits)
}
