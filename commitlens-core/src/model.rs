//! Summarization-model collaborator: the `ModelClient` seam and an OpenAI
//! Chat Completions implementation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::call_log::{create_http_client, ServiceType};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Models whose name contains this marker reject a sampling temperature.
pub const REASONING_MODEL_MARKER: &str = "gpt-5";

/// Temperature sent to every model that accepts one.
pub const SUMMARY_TEMPERATURE: f32 = 0.2;

pub fn is_reasoning_model(model: &str) -> bool {
    model.to_lowercase().contains(REASONING_MODEL_MARKER)
}

/// One prompt for the model. `temperature` is `None` when it must be omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Build a request, applying the reasoning-tier temperature rule.
    pub fn for_model(model: &str, system_prompt: String, user_prompt: String) -> Self {
        let temperature = if is_reasoning_model(model) {
            None
        } else {
            Some(SUMMARY_TEMPERATURE)
        };

        Self {
            model: model.to_string(),
            system_prompt,
            user_prompt,
            temperature,
        }
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Return the generated text. No structure is guaranteed.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl From<&CompletionRequest> for ChatCompletionRequest {
    fn from(request: &CompletionRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, or an empty string.
    pub fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(DEFAULT_OPENAI_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: String) -> Result<Self> {
        Ok(Self {
            client: create_http_client(ServiceType::OpenAi)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest::from(request);

        info!(
            "Requesting completion from {} ({} prompt chars)",
            request.model,
            request.user_prompt.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(&body)?)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!("OpenAI API error: {} - {}", status, error_text);
            return Err(anyhow!("OpenAI API error: {} - {}", status, error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        Ok(completion.into_text())
    }
}
