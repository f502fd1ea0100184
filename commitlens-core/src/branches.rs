use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnalysisError;
use crate::hosting::HostingApi;
use crate::repo_ref::RepoRef;

/// Answer to a branch listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchListing {
    pub valid: bool,
    /// Normalized `owner/name`, or the input as given when invalid.
    pub repo: String,
    pub default_branch: Option<String>,
    pub private: bool,
    pub branches: Vec<String>,
}

impl BranchListing {
    fn invalid(input: &str) -> Self {
        Self {
            repo: input.trim().to_string(),
            ..Self::default()
        }
    }
}

/// Validate a repository reference and list its branches, sorted by name.
///
/// An unparseable reference is not an error: it yields `valid: false`
/// without contacting the hosting API.
pub async fn list_branches(
    hosting: &dyn HostingApi,
    input: &str,
) -> Result<BranchListing, AnalysisError> {
    let Ok(repo) = RepoRef::parse(input) else {
        return Ok(BranchListing::invalid(input));
    };

    let metadata = hosting.get_repository(&repo).await?;
    let mut branches = hosting.list_branches(&repo).await?;
    branches.sort();
    info!("Listed {} branches of {}", branches.len(), repo);

    Ok(BranchListing {
        valid: true,
        repo: repo.to_string(),
        default_branch: Some(metadata.default_branch),
        private: metadata.private,
        branches,
    })
}
