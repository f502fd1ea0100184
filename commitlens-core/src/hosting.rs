//! Source-control hosting collaborator: the `HostingApi` seam and its
//! GitHub REST implementation.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::call_log::{create_http_client, ServiceType};
use crate::repo_ref::RepoRef;
use crate::types::{CommitRef, CommitStats, FileChange};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

#[derive(Debug, Error)]
pub enum HostingError {
    /// Missing, private without credential, forbidden, or rate-limited.
    #[error("GitHub API error: {status} - {message}")]
    NotAccessible { status: u16, message: String },

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl HostingError {
    /// Classify a non-success upstream response.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 | 404 | 429 => Self::NotAccessible { status, message },
            _ => Self::Api { status, message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoMetadata {
    pub full_name: String,
    pub default_branch: String,
    pub private: bool,
}

/// One entry of a commit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedCommit {
    pub commit: CommitRef,
    pub parent_count: usize,
}

impl ListedCommit {
    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }
}

/// Full detail of one commit: per-file stats and patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDetail {
    pub sha: String,
    pub files: Vec<FileChange>,
    pub stats: Option<CommitStats>,
}

/// Commit listing constraints. `since`/`until` are forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    pub branch: String,
    pub since: String,
    pub until: String,
}

#[async_trait]
pub trait HostingApi: Send + Sync {
    async fn get_repository(&self, repo: &RepoRef) -> Result<RepoMetadata, HostingError>;

    /// Branch names in the order the hosting service enumerates them.
    async fn list_branches(&self, repo: &RepoRef) -> Result<Vec<String>, HostingError>;

    /// Commits reachable from `query.branch` within the window, newest first.
    async fn list_commits(
        &self,
        repo: &RepoRef,
        query: &CommitQuery,
    ) -> Result<Vec<ListedCommit>, HostingError>;

    async fn get_commit(&self, repo: &RepoRef, sha: &str) -> Result<CommitDetail, HostingError>;
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    full_name: String,
    default_branch: String,
    #[serde(default)]
    private: bool,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitSignature {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitCommitResponse {
    author: Option<GitSignature>,
    committer: Option<GitSignature>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: GitCommitResponse,
    #[serde(default)]
    parents: Vec<IgnoredAny>,
    #[serde(default)]
    files: Vec<FileResponse>,
    stats: Option<StatsResponse>,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changes: u64,
    patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    additions: u64,
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

impl CommitResponse {
    fn to_commit_ref(&self) -> CommitRef {
        let author = self
            .commit
            .author
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let date = self
            .commit
            .author
            .as_ref()
            .and_then(|a| a.date)
            .or_else(|| self.commit.committer.as_ref().and_then(|c| c.date));

        CommitRef {
            sha: self.sha.clone(),
            author,
            date,
            message: self.commit.message.clone(),
        }
    }
}

impl From<FileResponse> for FileChange {
    fn from(file: FileResponse) -> Self {
        FileChange {
            filename: file.filename,
            status: file.status,
            additions: file.additions,
            deletions: file.deletions,
            changes: file.changes,
            patch: file.patch.unwrap_or_default(),
        }
    }
}

/// GitHub REST v3 client authenticated with an optional bearer token.
#[derive(Clone)]
pub struct GitHubClient {
    client: ClientWithMiddleware,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_GITHUB_API_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_http_client(ServiceType::GitHub)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn repo_url(&self, repo: &RepoRef, suffix: &str) -> Result<url::Url, HostingError> {
        let raw = format!(
            "{}/repos/{}/{}{}",
            self.base_url, repo.owner, repo.name, suffix
        );
        url::Url::parse(&raw)
            .with_context(|| format!("Invalid GitHub URL: {}", raw))
            .map_err(HostingError::from)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &url::Url,
        what: &str,
    ) -> Result<T, HostingError> {
        let mut request_builder = self
            .client
            .get(url.as_str())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");

        if let Some(token) = &self.token {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", token));
        }

        let response = request_builder
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.message)
                .unwrap_or(error_text);
            error!("GitHub API error fetching {}: {} - {}", what, status, message);
            return Err(HostingError::from_status(status, message));
        }

        let parsed = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))?;
        Ok(parsed)
    }

    async fn get_paginated<T: DeserializeOwned>(
        &self,
        url: &url::Url,
        what: &str,
    ) -> Result<Vec<T>, HostingError> {
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let items: Vec<T> = self.get_json(&page_url, what).await?;
            let items_count = items.len();
            all_items.extend(items);

            // A short page is the last page
            if items_count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(all_items)
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn get_repository(&self, repo: &RepoRef) -> Result<RepoMetadata, HostingError> {
        let url = self.repo_url(repo, "")?;
        let response: RepositoryResponse = self.get_json(&url, "repository").await?;
        Ok(RepoMetadata {
            full_name: response.full_name,
            default_branch: response.default_branch,
            private: response.private,
        })
    }

    async fn list_branches(&self, repo: &RepoRef) -> Result<Vec<String>, HostingError> {
        let url = self.repo_url(repo, "/branches")?;
        let branches: Vec<BranchResponse> = self.get_paginated(&url, "branches").await?;
        info!("Found {} branches in {}", branches.len(), repo);
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        query: &CommitQuery,
    ) -> Result<Vec<ListedCommit>, HostingError> {
        let mut url = self.repo_url(repo, "/commits")?;
        url.query_pairs_mut()
            .append_pair("sha", &query.branch)
            .append_pair("since", &query.since)
            .append_pair("until", &query.until);

        let commits: Vec<CommitResponse> = self.get_paginated(&url, "commits").await?;
        info!(
            "Listed {} commits on {} in {}",
            commits.len(),
            query.branch,
            repo
        );

        Ok(commits
            .iter()
            .map(|c| ListedCommit {
                commit: c.to_commit_ref(),
                parent_count: c.parents.len(),
            })
            .collect())
    }

    async fn get_commit(&self, repo: &RepoRef, sha: &str) -> Result<CommitDetail, HostingError> {
        let url = self.repo_url(repo, &format!("/commits/{}", sha))?;
        let response: CommitResponse = self.get_json(&url, "commit detail").await?;

        Ok(CommitDetail {
            sha: response.sha,
            files: response.files.into_iter().map(FileChange::from).collect(),
            stats: response.stats.map(|s| CommitStats {
                additions: s.additions,
                deletions: s.deletions,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_status_classifies_access_failures() {
        for status in [401, 403, 404, 429] {
            assert!(matches!(
                HostingError::from_status(status, "nope".to_string()),
                HostingError::NotAccessible { .. }
            ));
        }
        assert!(matches!(
            HostingError::from_status(500, "boom".to_string()),
            HostingError::Api { status: 500, .. }
        ));
        assert!(matches!(
            HostingError::from_status(409, "Git Repository is empty.".to_string()),
            HostingError::Api { status: 409, .. }
        ));
    }

    #[test]
    fn test_commit_listing_prefers_author_date() {
        let response: CommitResponse = serde_json::from_value(json!({
            "sha": "abc1234def",
            "commit": {
                "author": { "name": "Ada", "date": "2025-01-02T10:00:00Z" },
                "committer": { "name": "Bot", "date": "2025-01-03T10:00:00Z" },
                "message": "fix: thing"
            },
            "parents": [{ "sha": "p1" }, { "sha": "p2" }]
        }))
        .unwrap();

        let commit = response.to_commit_ref();
        assert_eq!(commit.author, "Ada");
        assert_eq!(commit.date.unwrap().to_rfc3339(), "2025-01-02T10:00:00+00:00");
        assert_eq!(response.parents.len(), 2);
    }

    #[test]
    fn test_commit_listing_falls_back_to_committer_date() {
        let response: CommitResponse = serde_json::from_value(json!({
            "sha": "abc1234def",
            "commit": {
                "author": null,
                "committer": { "name": "Bot", "date": "2025-01-03T10:00:00Z" },
                "message": "chore: bump"
            }
        }))
        .unwrap();

        let commit = response.to_commit_ref();
        assert_eq!(commit.author, "unknown");
        assert_eq!(commit.date.unwrap().to_rfc3339(), "2025-01-03T10:00:00+00:00");
    }

    #[test]
    fn test_file_without_patch_gets_empty_patch() {
        let file: FileResponse = serde_json::from_value(json!({
            "filename": "logo.png",
            "status": "added",
            "additions": 0,
            "deletions": 0,
            "changes": 0
        }))
        .unwrap();

        let change = FileChange::from(file);
        assert_eq!(change.patch, "");
        assert_eq!(change.status, "added");
    }

    #[test]
    fn test_token_blank_is_treated_as_unset() {
        let client = GitHubClient::new(Some("   ".to_string())).unwrap();
        assert!(client.token.is_none());
    }

    #[test]
    fn test_repo_url_joins_base_and_path() {
        let client =
            GitHubClient::with_base_url("http://localhost:9999/", None).unwrap();
        let url = client
            .repo_url(&RepoRef::new("octo", "demo"), "/commits/abc")
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:9999/repos/octo/demo/commits/abc");
    }

    mod over_http {
        use super::*;
        use axum::extract::{RawQuery, State};
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::get;
        use axum::{Json, Router};
        use std::sync::{Arc, Mutex};

        /// Query string and Authorization header of each request served.
        #[derive(Clone, Default)]
        struct Seen(Arc<Mutex<Vec<(String, Option<String>)>>>);

        impl Seen {
            fn record(&self, query: Option<String>, headers: &HeaderMap) -> String {
                let query = query.unwrap_or_default();
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                self.0.lock().unwrap().push((query.clone(), auth));
                query
            }

            fn requests(&self) -> Vec<(String, Option<String>)> {
                self.0.lock().unwrap().clone()
            }
        }

        fn page_of(query: &str) -> usize {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("page="))
                .and_then(|page| page.parse().ok())
                .unwrap_or(1)
        }

        async fn serve(router: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
            format!("http://{}", addr)
        }

        async fn branch_pages(
            State(seen): State<Seen>,
            RawQuery(query): RawQuery,
            headers: HeaderMap,
        ) -> Json<serde_json::Value> {
            let page = page_of(&seen.record(query, &headers));
            let names: Vec<_> = if page <= 2 {
                (0..PER_PAGE)
                    .map(|i| json!({ "name": format!("b{}-{}", page, i) }))
                    .collect()
            } else {
                Vec::new()
            };
            Json(json!(names))
        }

        async fn commit_page(
            State(seen): State<Seen>,
            RawQuery(query): RawQuery,
            headers: HeaderMap,
        ) -> Json<serde_json::Value> {
            seen.record(query, &headers);
            Json(json!([{
                "sha": "abc123",
                "commit": {
                    "author": { "name": "Ada", "date": "2025-01-10T10:00:00Z" },
                    "message": "Fix parser"
                },
                "parents": [{ "sha": "p1" }, { "sha": "p2" }]
            }]))
        }

        async fn rate_limited() -> (StatusCode, Json<serde_json::Value>) {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "message": "API rate limit exceeded" })),
            )
        }

        #[tokio::test]
        async fn test_branch_pages_are_fetched_until_short_page() {
            let seen = Seen::default();
            let router = Router::new()
                .route("/repos/octo/demo/branches", get(branch_pages))
                .with_state(seen.clone());
            let base_url = serve(router).await;

            let client = GitHubClient::with_base_url(&base_url, Some("  ".to_string())).unwrap();
            let branches = client
                .list_branches(&RepoRef::new("octo", "demo"))
                .await
                .unwrap();

            assert_eq!(branches.len(), 200);
            assert_eq!(branches[0], "b1-0");
            assert_eq!(branches[199], "b2-99");

            let requests = seen.requests();
            assert_eq!(requests.len(), 3);
            assert_eq!(requests[0].0, "per_page=100&page=1");
            assert_eq!(requests[2].0, "per_page=100&page=3");
            assert!(requests.iter().all(|(_, auth)| auth.is_none()));
        }

        #[tokio::test]
        async fn test_commit_listing_forwards_window_and_token() {
            let seen = Seen::default();
            let router = Router::new()
                .route("/repos/octo/demo/commits", get(commit_page))
                .with_state(seen.clone());
            let base_url = serve(router).await;

            let client =
                GitHubClient::with_base_url(&base_url, Some("secret".to_string())).unwrap();
            let query = CommitQuery {
                branch: "main".to_string(),
                since: "2025-01-01".to_string(),
                until: "2025-01-31T23:59:59Z".to_string(),
            };
            let commits = client
                .list_commits(&RepoRef::new("octo", "demo"), &query)
                .await
                .unwrap();

            assert_eq!(commits.len(), 1);
            assert!(commits[0].is_merge());
            assert_eq!(commits[0].commit.author, "Ada");

            let requests = seen.requests();
            assert_eq!(requests.len(), 1);
            assert_eq!(
                requests[0].0,
                "sha=main&since=2025-01-01&until=2025-01-31T23%3A59%3A59Z&per_page=100&page=1"
            );
            assert_eq!(requests[0].1.as_deref(), Some("Bearer secret"));
        }

        #[tokio::test]
        async fn test_rate_limit_is_not_accessible() {
            let router = Router::new().route("/repos/octo/demo", get(rate_limited));
            let base_url = serve(router).await;

            let client = GitHubClient::with_base_url(&base_url, None).unwrap();
            let error = client
                .get_repository(&RepoRef::new("octo", "demo"))
                .await
                .unwrap_err();

            match error {
                HostingError::NotAccessible { status, message } => {
                    assert_eq!(status, 429);
                    assert_eq!(message, "API rate limit exceeded");
                }
                other => panic!("expected NotAccessible, got {:?}", other),
            }
        }
    }
}
