use anyhow::{Context, Result};
use std::env;

use commitlens_core::{DEFAULT_GITHUB_API_URL, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL};

#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Bearer token for the GitHub API. Anonymous access when unset, which
    /// limits the service to public repositories.
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let openai_api_key = parse_optional_token(lookup("OPENAI_API_KEY"))
            .context("OPENAI_API_KEY environment variable is required")?;

        let openai_model = parse_optional_token(lookup("OPENAI_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let openai_base_url = lookup("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        let github_token = parse_optional_token(lookup("GITHUB_TOKEN"));

        let github_api_url =
            lookup("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        Ok(Config {
            openai_api_key,
            openai_model,
            openai_base_url,
            github_token,
            github_api_url,
            port,
        })
    }
}

/// Returns None if the value is missing, empty, or contains only whitespace.
pub fn parse_optional_token(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
