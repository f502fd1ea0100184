pub mod aggregate;
pub mod branches;
pub mod call_log;
pub mod collector;
pub mod enricher;
pub mod error;
pub mod hosting;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod repo_ref;
pub mod rollup;
pub mod summarizer;
pub mod test_utils;
pub mod types;

pub use branches::{list_branches, BranchListing};
pub use call_log::{create_http_client, CallLogMiddleware, ServiceType};
pub use collector::{collect_commits, BranchSelector, CollectOptions, ANY_BRANCH};
pub use error::AnalysisError;
pub use hosting::{GitHubClient, HostingApi, HostingError, DEFAULT_GITHUB_API_URL};
pub use model::{
    CompletionRequest, ModelClient, OpenAIClient, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL,
};
pub use pipeline::{AnalysisRequest, Analyzer, PipelineStage, DEFAULT_MAX_COMMITS};
pub use progress::{
    ProgressEvent, ProgressMessage, ProgressReceiver, ProgressRegistry, ProgressReporter,
};
pub use repo_ref::{InvalidRepoFormat, RepoRef};
pub use types::*;
