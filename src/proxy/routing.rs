// Backend selection and effective-model resolution.
//
// Vision routing keys off the latest message only. Images anywhere else are
// stripped so text-only backends never see them.

use crate::models::config::{BackendConfig, RouterConfig};
use crate::proxy::common::images::{has_any_image, last_message_has_image, strip_images};
use crate::proxy::common::model_discovery::ModelDiscoveryCache;
use crate::proxy::mappers::claude::models::ClaudeRequest;
use crate::proxy::upstream::{UpstreamClient, UpstreamError};

pub struct BackendSelection<'a> {
    pub backend: &'a BackendConfig,
    pub is_vision: bool,
}

/// Pick the backend for a request, mutating it when images have to go.
///
/// - image in the last message and a vision backend configured: vision
/// - image in the last message, no vision backend: warn, strip, default
/// - images only in earlier turns: strip, default
pub fn select_backend<'a>(
    config: &'a RouterConfig,
    request: &mut ClaudeRequest,
) -> BackendSelection<'a> {
    if last_message_has_image(request) {
        match &config.vision_backend {
            Some(vision) => {
                tracing::debug!("[Routing] Image in latest message, using vision backend");
                return BackendSelection {
                    backend: vision,
                    is_vision: true,
                };
            }
            None => {
                tracing::warn!(
                    "[Routing] Request contains images but no vision backend is configured"
                );
            }
        }
    }

    if has_any_image(request) {
        let removed = strip_images(request);
        tracing::warn!(
            "[Routing] Removed {} image block(s) for text-only backend",
            removed
        );
    }

    BackendSelection {
        backend: &config.backend,
        is_vision: false,
    }
}

/// Resolve the model to send upstream.
///
/// A configured model always wins over the client's requested model; the
/// divergence is logged but not an error. "auto" backends go through the
/// discovery cache.
pub async fn resolve_model(
    backend: &BackendConfig,
    requested_model: &str,
    upstream: &UpstreamClient,
    cache: &ModelDiscoveryCache,
) -> Result<String, UpstreamError> {
    if !backend.needs_discovery() {
        if backend.model != requested_model {
            tracing::warn!(
                "[Routing] Client requested '{}', overridden by backend model '{}'",
                requested_model,
                backend.model
            );
        }
        return Ok(backend.model.clone());
    }

    if let Some(model) = cache.get(&backend.url) {
        return Ok(model);
    }

    let model = upstream.discover_model(backend).await?;
    cache.insert(&backend.url, model.clone());
    Ok(model)
}
