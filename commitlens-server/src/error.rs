use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use commitlens_core::AnalysisError;

/// HTTP rendering of a failed request.
#[derive(Debug)]
pub struct ApiError(pub AnalysisError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            AnalysisError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AnalysisError::RepoNotAccessible { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AnalysisError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
