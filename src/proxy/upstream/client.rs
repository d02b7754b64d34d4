// Backend client for OpenAI-compatible chat-completions servers.
// Built on reqwest with bounded timeouts and connection pooling.

use reqwest::{header, Client, Response, StatusCode};
use thiserror::Error;
use tokio::time::Duration;

use crate::models::config::BackendConfig;
use crate::proxy::mappers::openai::models::OpenAIModelList;

const DEFAULT_USER_AGENT: &str = "messages-gateway/1.0";

/// Startup health probe timeout. Request timeouts are much longer since
/// completions can run for minutes.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("backend at {0} advertises no models")]
    NoModels(String),
}

impl UpstreamError {
    /// Status to surface to the client. Backend statuses pass through,
    /// transport failures map to 502.
    pub fn client_status(&self) -> StatusCode {
        match self {
            UpstreamError::Status { status, .. } => *status,
            UpstreamError::Http(_) => StatusCode::BAD_GATEWAY,
            UpstreamError::NoModels(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    pub fn new() -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(600))
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    fn auth_headers(backend: &BackendConfig) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(api_key) = &backend.api_key {
            if let Ok(value) = header::HeaderValue::from_str(&format!("Bearer {}", api_key)) {
                headers.insert(header::AUTHORIZATION, value);
            } else {
                tracing::warn!("[Upstream] API key contains invalid header characters, skipping");
            }
        }
        headers
    }

    /// POST a chat-completions request. The caller decides whether to read
    /// the body as JSON or as a byte stream.
    ///
    /// A non-success status is returned as `UpstreamError::Status` with the
    /// backend's body text attached.
    pub async fn chat_completions(
        &self,
        backend: &BackendConfig,
        body: &serde_json::Value,
    ) -> Result<Response, UpstreamError> {
        let url = join_url(&backend.url, "/v1/chat/completions");
        tracing::debug!(
            "[Upstream] POST {} (model={})",
            url,
            body.get("model").and_then(|m| m.as_str()).unwrap_or("?")
        );

        let response = self
            .client
            .post(&url)
            .headers(Self::auth_headers(backend))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("[Upstream] Backend returned {}: {}", status, body);
            return Err(UpstreamError::Status { status, body });
        }

        Ok(response)
    }

    /// Fetch the backend's first advertised model id.
    pub async fn discover_model(&self, backend: &BackendConfig) -> Result<String, UpstreamError> {
        let url = join_url(&backend.url, "/v1/models");

        let response = self
            .client
            .get(&url)
            .headers(Self::auth_headers(backend))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        let list: OpenAIModelList = response.json().await?;
        match list.data.into_iter().next() {
            Some(model) => {
                tracing::info!("[Upstream] Discovered model '{}' at {}", model.id, backend.url);
                Ok(model.id)
            }
            None => Err(UpstreamError::NoModels(backend.url.clone())),
        }
    }

    /// Startup reachability probe: /health first, then /v1/models. A 401
    /// still proves the backend is there.
    pub async fn check_health(&self, backend: &BackendConfig) -> bool {
        for path in ["/health", "/v1/models"] {
            let url = join_url(&backend.url, path);
            match self
                .client
                .get(&url)
                .headers(Self::auth_headers(backend))
                .timeout(HEALTH_TIMEOUT)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() || resp.status() == StatusCode::UNAUTHORIZED => {
                    tracing::info!("[Upstream] Backend {} reachable via {}", backend.url, path);
                    return true;
                }
                Ok(resp) => {
                    tracing::debug!("[Upstream] {} returned {}", url, resp.status());
                }
                Err(e) => {
                    tracing::debug!("[Upstream] {} unreachable: {}", url, e);
                }
            }
        }
        false
    }
}
