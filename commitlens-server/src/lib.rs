pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use commitlens_core::Analyzer;

pub use error::ApiError;

pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/help", get(handlers::help_handler))
        .route("/api/analyze", post(handlers::analyze_handler))
        .route("/api/branches", get(handlers::branches_handler))
        .route("/api/progress/:request_id", get(handlers::progress_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
