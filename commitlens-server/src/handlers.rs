use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use commitlens_core::{
    list_branches, AnalysisError, AnalysisReport, AnalysisRequest, BranchListing, ProgressMessage,
    ProgressReceiver, ProgressRegistry, ANY_BRANCH,
};

use crate::{get_version, ApiError, AppState};

pub async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "commitlens"
    })))
}

pub async fn help_handler() -> Json<serde_json::Value> {
    let branch_help = format!(
        "branch name, {} for every branch, or omitted for the default branch",
        ANY_BRANCH
    );
    Json(json!({
        "service": "commitlens",
        "version": get_version(),
        "description": "AI-summarized commit history reports for GitHub repositories",
        "endpoints": [
            {
                "path": "/health",
                "method": "GET",
                "description": "Health check endpoint"
            },
            {
                "path": "/help",
                "method": "GET",
                "description": "API documentation and service information"
            },
            {
                "path": "/api/analyze",
                "method": "POST",
                "description": "Analyze commits in a date window and produce a period report",
                "body": {
                    "repo": "owner/name or https://github.com/owner/name",
                    "since": "ISO-8601 timestamp or YYYY-MM-DD",
                    "until": "ISO-8601 timestamp or YYYY-MM-DD",
                    "branch": branch_help,
                    "includeMerges": "boolean (default: false)",
                    "maxCommits": "positive integer (default: 60)",
                    "requestId": "optional id for /api/progress"
                }
            },
            {
                "path": "/api/branches?repo=owner/name",
                "method": "GET",
                "description": "Validate a repository and list its branches"
            },
            {
                "path": "/api/progress/{requestId}",
                "method": "GET",
                "description": "Server-sent progress events for a run: message, ready, done"
            }
        ],
        "configuration": {
            "required_env_vars": ["OPENAI_API_KEY"],
            "optional_env_vars": [
                "OPENAI_MODEL (default: gpt-4o-mini)",
                "OPENAI_BASE_URL (default: https://api.openai.com/v1)",
                "GITHUB_TOKEN (default: anonymous access)",
                "GITHUB_API_URL (default: https://api.github.com)",
                "PORT (default: 3000)",
                "RUST_LOG (default: info)"
            ]
        }
    }))
}

pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| AnalysisError::invalid_input(rejection.body_text()))?;
    info!(
        "Analysis requested for {} ({} to {})",
        request.repo, request.since, request.until
    );

    // Detached so a dropped connection does not abandon the run mid-way
    let analyzer = state.analyzer.clone();
    let report = tokio::spawn(async move { analyzer.analyze(request).await })
        .await
        .map_err(|e| AnalysisError::Pipeline(anyhow!("Analysis task failed: {}", e)))??;

    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct BranchesQuery {
    #[serde(default)]
    pub repo: String,
}

pub async fn branches_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BranchesQuery>,
) -> Result<Json<BranchListing>, ApiError> {
    let listing = list_branches(state.analyzer.hosting(), &query.repo).await?;
    Ok(Json(listing))
}

/// An SSE observer's hold on its progress channel.
///
/// Dropped with the response body, including when the client disconnects.
struct Subscription {
    receiver: ProgressReceiver,
    registry: Arc<ProgressRegistry>,
    request_id: String,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        let registry = self.registry.clone();
        let request_id = std::mem::take(&mut self.request_id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { registry.detach(&request_id).await });
        }
    }
}

pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let registry = state.analyzer.registry().clone();
    let receiver = registry.subscribe(&request_id).await;
    let subscription = Subscription {
        receiver,
        registry,
        request_id,
    };

    // The registry drops the sender once it has delivered `Done`, which ends
    // the stream.
    let events = futures::stream::unfold(subscription, |mut subscription| async move {
        let message = subscription.receiver.recv().await?;
        Some((progress_to_sse(message), subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn progress_to_sse(message: ProgressMessage) -> Result<Event, Infallible> {
    let event = match message {
        ProgressMessage::Event(event) => {
            let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".into());
            Event::default().event("message").data(payload)
        }
        ProgressMessage::Ready => Event::default().event("ready").data("ready"),
        ProgressMessage::Done => Event::default().event("done").data("done"),
    };
    Ok(event)
}
