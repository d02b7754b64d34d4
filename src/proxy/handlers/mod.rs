// Handlers module - API endpoint processors

pub mod claude;
pub mod openai;

use std::sync::Arc;

use crate::models::config::RouterConfig;
use crate::proxy::common::model_discovery::ModelDiscoveryCache;
use crate::proxy::upstream::UpstreamClient;

/// Shared application state for Axum handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RouterConfig>,
    pub upstream: Arc<UpstreamClient>,
    pub discovery: Arc<ModelDiscoveryCache>,
}

impl AppState {
    pub fn new(
        config: Arc<RouterConfig>,
        upstream: Arc<UpstreamClient>,
        discovery: Arc<ModelDiscoveryCache>,
    ) -> Self {
        Self {
            config,
            upstream,
            discovery,
        }
    }
}
