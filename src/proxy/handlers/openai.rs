// OpenAI Handler - /v1/chat/completions passthrough

use axum::{
    body::Body,
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::claude::sse_response;
use super::AppState;
use crate::proxy::routing::resolve_model;

fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "type": error_type,
                "message": message
            }
        })),
    )
        .into_response()
}

/// Failure on a streaming request goes out as a single data event, the
/// shape OpenAI clients already parse mid-stream.
fn sse_error_response(message: &str) -> Response {
    let event = json!({
        "error": {
            "type": "api_error",
            "message": message
        }
    });
    sse_response(Body::from(format!("data: {}\n\n", event)))
}

/// Any image_url part anywhere in the conversation routes to vision.
fn body_has_image(body: &Value) -> bool {
    let Some(messages) = body.get("messages").and_then(Value::as_array) else {
        return false;
    };
    messages.iter().any(|msg| {
        msg.get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .any(|p| p.get("type").and_then(Value::as_str) == Some("image_url"))
            })
            .unwrap_or(false)
    })
}

/// Handle OpenAI chat completions: POST /v1/chat/completions
///
/// Passthrough endpoint for clients already speaking the backend protocol.
/// The body is forwarded untouched apart from the model override; stream
/// chunks (including the `[DONE]` sentinel) are relayed verbatim.
pub async fn handle_chat_completions(
    State(state): State<AppState>,
    Json(mut body): Json<Value>,
) -> Response {
    let trace_id = format!("oai_{}", chrono::Utc::now().timestamp_subsec_millis());

    let is_stream = body
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let requested_model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let backend = match (&state.config.vision_backend, body_has_image(&body)) {
        (Some(vision), true) => {
            debug!("[{}] Image content, using vision backend", trace_id);
            vision
        }
        _ => &state.config.backend,
    };

    info!(
        "[{}] Chat completions passthrough | Model: {} | Stream: {}",
        trace_id, requested_model, is_stream,
    );

    let effective_model = match resolve_model(
        backend,
        &requested_model,
        &state.upstream,
        &state.discovery,
    )
    .await
    {
        Ok(m) => m,
        Err(e) => {
            debug!("[{}] Model resolution failed: {}", trace_id, e);
            return if is_stream {
                sse_error_response(&e.to_string())
            } else {
                error_response(e.client_status(), "api_error", e.to_string())
            };
        }
    };
    if let Some(obj) = body.as_object_mut() {
        obj.insert("model".to_string(), json!(effective_model));
    }

    let response = match state.upstream.chat_completions(backend, &body).await {
        Ok(r) => r,
        Err(e) => {
            debug!("[{}] Backend request failed: {}", trace_id, e);
            return if is_stream {
                sse_error_response(&e.to_string())
            } else {
                error_response(e.client_status(), "api_error", e.to_string())
            };
        }
    };

    if is_stream {
        return sse_response(Body::from_stream(response.bytes_stream()));
    }

    match response.json::<Value>().await {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => error_response(
            StatusCode::BAD_GATEWAY,
            "api_error",
            format!("Backend returned unparseable response: {}", e),
        ),
    }
}
