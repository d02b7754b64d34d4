use std::sync::Arc;

use messages_gateway::models::config::RouterConfig;
use messages_gateway::proxy::server::AxumServer;
use messages_gateway::proxy::upstream::UpstreamClient;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,axum=info,reqwest=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(RouterConfig::from_env());
    tracing::info!(
        "Backend: {} (model: {})",
        config.backend.url,
        if config.backend.needs_discovery() {
            "auto"
        } else {
            &config.backend.model
        }
    );
    if let Some(vision) = &config.vision_backend {
        tracing::info!("Vision backend: {}", vision.url);
    }
    if config.auth_enabled() {
        tracing::info!("API key auth enabled");
    }

    let upstream = Arc::new(UpstreamClient::new()?);

    // Reachability probes are informational; the gateway starts regardless
    if !upstream.check_health(&config.backend).await {
        tracing::warn!("Default backend {} is not reachable", config.backend.url);
    }
    if let Some(vision) = &config.vision_backend {
        if !upstream.check_health(vision).await {
            tracing::warn!("Vision backend {} is not reachable", vision.url);
        }
    }

    let (server, handle) = AxumServer::start(config, upstream)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    handle.await?;

    Ok(())
}
