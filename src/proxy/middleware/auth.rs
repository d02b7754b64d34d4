// API key authentication middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::models::config::RouterConfig;

/// Pull an API key from `Authorization: Bearer` (or a bare Authorization
/// value) or `x-api-key`.
pub fn extract_api_key(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or(Some(s)))
        .map(|s| s.to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-api-key")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
}

fn is_health_path(path: &str) -> bool {
    path == "/health" || path == "/healthz"
}

fn unauthorized_response() -> Response {
    let body = serde_json::json!({
        "type": "error",
        "error": {
            "type": "authentication_error",
            "message": "Invalid or missing API key"
        }
    });
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| {
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = StatusCode::UNAUTHORIZED;
            resp
        })
}

/// Gate requests on the configured gateway key. Health endpoints and CORS
/// preflight pass through; everything else needs a matching key when one
/// is configured.
pub async fn auth_middleware(
    State(config): State<Arc<RouterConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if request.method() == Method::OPTIONS || is_health_path(&path) {
        return next.run(request).await;
    }

    if !config.auth_enabled() {
        return next.run(request).await;
    }

    match extract_api_key(&request) {
        Some(provided) if provided == config.api_key => next.run(request).await,
        Some(_) => {
            tracing::warn!("[Auth] Rejected request to {} with wrong API key", path);
            unauthorized_response()
        }
        None => {
            tracing::warn!("[Auth] Rejected request to {} without API key", path);
            unauthorized_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/v1/messages");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_prefix_stripped() {
        let req = request_with_headers(&[("authorization", "Bearer sk-test")]);
        assert_eq!(extract_api_key(&req), Some("sk-test".to_string()));
    }

    #[test]
    fn test_bare_authorization_accepted() {
        let req = request_with_headers(&[("authorization", "sk-test")]);
        assert_eq!(extract_api_key(&req), Some("sk-test".to_string()));
    }

    #[test]
    fn test_x_api_key_fallback() {
        let req = request_with_headers(&[("x-api-key", "sk-other")]);
        assert_eq!(extract_api_key(&req), Some("sk-other".to_string()));
    }

    #[test]
    fn test_authorization_wins_over_x_api_key() {
        let req = request_with_headers(&[
            ("authorization", "Bearer sk-auth"),
            ("x-api-key", "sk-x"),
        ]);
        assert_eq!(extract_api_key(&req), Some("sk-auth".to_string()));
    }

    #[test]
    fn test_no_headers_yields_none() {
        let req = request_with_headers(&[]);
        assert_eq!(extract_api_key(&req), None);
    }

    #[test]
    fn test_health_paths() {
        assert!(is_health_path("/health"));
        assert!(is_health_path("/healthz"));
        assert!(!is_health_path("/v1/messages"));
    }

    proptest! {
        /// Whatever key the client sends via Bearer comes back out intact.
        #[test]
        fn prop_bearer_key_round_trips(key in "[A-Za-z0-9_-]{1,64}") {
            let header_value = format!("Bearer {}", key);
            let req = request_with_headers(&[("authorization", header_value.as_str())]);
            prop_assert_eq!(extract_api_key(&req), Some(key));
        }

        /// x-api-key values come back out intact.
        #[test]
        fn prop_x_api_key_round_trips(key in "[A-Za-z0-9_-]{1,64}") {
            let req = request_with_headers(&[("x-api-key", key.as_str())]);
            prop_assert_eq!(extract_api_key(&req), Some(key));
        }
    }
}
