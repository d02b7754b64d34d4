pub mod auth;

pub use auth::auth_middleware;

use tower_http::cors::{Any, CorsLayer};

/// Permissive CORS for local tooling that talks to the gateway directly.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
