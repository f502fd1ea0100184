use std::time::Instant;

use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use tracing::{debug, warn};

/// Which upstream a client talks to; used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    GitHub,
    OpenAi,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::OpenAi => "openai",
        }
    }
}

/// Logs every upstream call with its status and latency.
///
/// Only the method and URL path are logged, so credentials carried in
/// headers or query strings never reach the log.
pub struct CallLogMiddleware {
    service_type: ServiceType,
}

impl CallLogMiddleware {
    pub fn new(service_type: ServiceType) -> Self {
        Self { service_type }
    }
}

#[async_trait::async_trait]
impl Middleware for CallLogMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        let method = req.method().to_string();
        let path = req.url().path().to_string();
        let started = Instant::now();

        let response = next.run(req, extensions).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &response {
            Ok(resp) if resp.status().is_success() => {
                debug!(
                    service = self.service_type.as_str(),
                    %method,
                    %path,
                    status = resp.status().as_u16(),
                    elapsed_ms,
                    "upstream call"
                );
            }
            Ok(resp) => {
                warn!(
                    service = self.service_type.as_str(),
                    %method,
                    %path,
                    status = resp.status().as_u16(),
                    elapsed_ms,
                    "upstream call returned error status"
                );
            }
            Err(err) => {
                warn!(
                    service = self.service_type.as_str(),
                    %method,
                    %path,
                    elapsed_ms,
                    error = %err,
                    "upstream call failed"
                );
            }
        }

        response
    }
}

/// Build the shared HTTP client for one upstream service.
pub fn create_http_client(
    service_type: ServiceType,
) -> anyhow::Result<reqwest_middleware::ClientWithMiddleware> {
    use anyhow::Context;
    use reqwest_middleware::ClientBuilder;

    let client = reqwest::Client::builder()
        .user_agent(concat!("commitlens/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    Ok(ClientBuilder::new(client)
        .with(CallLogMiddleware::new(service_type))
        .build())
}
