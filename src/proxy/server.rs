// Gateway server - route assembly, middleware stack, and lifecycle

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::info;

use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};

use crate::models::config::RouterConfig;
use crate::proxy::common::model_discovery::ModelDiscoveryCache;
use crate::proxy::handlers::{self, AppState};
use crate::proxy::middleware::{auth_middleware, cors_layer};
use crate::proxy::upstream::UpstreamClient;

/// Default max request body: 100MB, base64 images are large
const DEFAULT_MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
    .into_response()
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/healthz", get(health_check_handler))
        .route("/v1/messages", post(handlers::claude::handle_messages))
        .route(
            "/v1/messages/count_tokens",
            post(handlers::claude::handle_count_tokens),
        )
        .route(
            "/v1/chat/completions",
            post(handlers::openai::handle_chat_completions),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(DefaultBodyLimit::max(DEFAULT_MAX_BODY_SIZE))
        .with_state(state)
}

/// Running gateway instance with a shutdown handle.
#[derive(Clone)]
pub struct AxumServer {
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    pub local_addr: SocketAddr,
}

impl AxumServer {
    /// Bind and start serving. Returns the instance and the serve task.
    pub async fn start(
        config: Arc<RouterConfig>,
        upstream: Arc<UpstreamClient>,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let discovery = Arc::new(ModelDiscoveryCache::new());
        let state = AppState::new(config.clone(), upstream, discovery);

        let app = build_router(state);

        let addr = format!("{}:{}", config.host, config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to read local addr: {}", e))?;

        info!("Gateway listening on http://{}", local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Gateway shutting down");
            });
            if let Err(e) = serve.await {
                tracing::error!("Server error: {}", e);
            }
        });

        Ok((
            Self {
                shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
                local_addr,
            },
            handle,
        ))
    }

    /// Signal the serve task to stop.
    pub async fn stop(&self) {
        let mut lock = self.shutdown_tx.lock().await;
        if let Some(tx) = lock.take() {
            let _ = tx.send(());
            info!("Gateway stop signal sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::BackendConfig;

    fn test_config(port: u16) -> Arc<RouterConfig> {
        Arc::new(RouterConfig {
            host: "127.0.0.1".to_string(),
            port,
            api_key: String::new(),
            backend: BackendConfig {
                url: "http://localhost:8000".to_string(),
                api_key: None,
                model: "test-model".to_string(),
            },
            vision_backend: None,
            web_search_prompt: false,
        })
    }

    #[tokio::test]
    async fn test_health_check_handler() {
        let response = health_check_handler().await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[test]
    fn test_router_builds_without_panic() {
        let state = AppState::new(
            test_config(0),
            Arc::new(UpstreamClient::new().unwrap()),
            Arc::new(ModelDiscoveryCache::new()),
        );
        let _router = build_router(state);
    }

    #[tokio::test]
    async fn test_server_start_and_stop() {
        // Port 0 lets the OS assign a free port
        let upstream = Arc::new(UpstreamClient::new().unwrap());
        let result = AxumServer::start(test_config(0), upstream).await;
        assert!(result.is_ok());

        let (server, handle) = result.unwrap();
        assert_ne!(server.local_addr.port(), 0);

        server.stop().await;
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_health_endpoint_over_http() {
        let upstream = Arc::new(UpstreamClient::new().unwrap());
        let (server, handle) = AxumServer::start(test_config(0), upstream).await.unwrap();

        let url = format!("http://{}/health", server.local_addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert!(resp.status().is_success());

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        server.stop().await;
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_chat_completions_passthrough_route_mounted() {
        let mut config = (*test_config(0)).clone();
        // Nothing listens here; the route should answer with a gateway
        // error body, not a 404
        config.backend.url = "http://127.0.0.1:1".to_string();
        let upstream = Arc::new(UpstreamClient::new().unwrap());
        let (server, handle) = AxumServer::start(Arc::new(config), upstream).await.unwrap();

        let client = reqwest::Client::new();
        let url = format!("http://{}/v1/chat/completions", server.local_addr);
        let resp = client
            .post(&url)
            .json(&serde_json::json!({
                "model": "test-model",
                "messages": [{"role": "user", "content": "Hi"}]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["type"], "api_error");

        server.stop().await;
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_auth_enforced_when_key_configured() {
        let mut config = (*test_config(0)).clone();
        config.api_key = "sk-secret".to_string();
        let upstream = Arc::new(UpstreamClient::new().unwrap());
        let (server, handle) = AxumServer::start(Arc::new(config), upstream).await.unwrap();

        let client = reqwest::Client::new();
        let url = format!("http://{}/v1/messages/count_tokens", server.local_addr);

        // No key: rejected
        let resp = client.post(&url).json(&serde_json::json!({})).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        // Correct key: accepted
        let resp = client
            .post(&url)
            .bearer_auth("sk-secret")
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["input_tokens"], 0);

        // Health stays open
        let health = format!("http://{}/health", server.local_addr);
        let resp = reqwest::get(&health).await.unwrap();
        assert!(resp.status().is_success());

        server.stop().await;
        let _ = handle.await;
    }
}
