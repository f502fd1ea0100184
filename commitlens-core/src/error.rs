//! Error taxonomy for an analysis run.
//!
//! Model-output malformation is deliberately absent: it is absorbed by the
//! summarizer and rollup fallbacks and never surfaces as an error.

use thiserror::Error;

use crate::hosting::HostingError;
use crate::repo_ref::InvalidRepoFormat;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Missing or malformed request fields. Raised before any upstream call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The hosting API reported the repository missing, private, forbidden
    /// or rate-limited. These are not told apart.
    #[error("repository not accessible ({status}): {message}")]
    RepoNotAccessible { status: u16, message: String },

    /// Any other collaborator failure.
    #[error("{0:#}")]
    Pipeline(#[from] anyhow::Error),
}

impl AnalysisError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Upstream HTTP status, where one is known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RepoNotAccessible { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<InvalidRepoFormat> for AnalysisError {
    fn from(err: InvalidRepoFormat) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<HostingError> for AnalysisError {
    fn from(err: HostingError) -> Self {
        match err {
            HostingError::NotAccessible { status, message } => {
                Self::RepoNotAccessible { status, message }
            }
            other => Self::Pipeline(anyhow::Error::new(other)),
        }
    }
}
