use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use commitlens_core::{Analyzer, GitHubClient, OpenAIClient, ProgressRegistry};
use commitlens_server::config::Config;
use commitlens_server::{app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting commitlens {}", commitlens_server::get_version());

    let config =
        Config::from_env().context("Failed to load configuration from environment variables")?;

    if config.github_token.is_none() {
        info!("GITHUB_TOKEN not set, only public repositories are reachable");
    }
    let github_client =
        GitHubClient::with_base_url(&config.github_api_url, config.github_token.clone())?;
    let openai_client =
        OpenAIClient::with_base_url(&config.openai_base_url, config.openai_api_key.clone())?;
    info!("Summarizing with model {}", config.openai_model);

    let analyzer = Analyzer::new(
        Arc::new(github_client),
        Arc::new(openai_client),
        Arc::new(ProgressRegistry::new()),
        config.openai_model.clone(),
    );
    let app_state = Arc::new(AppState::new(analyzer));

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app(app_state)).await?;

    Ok(())
}
