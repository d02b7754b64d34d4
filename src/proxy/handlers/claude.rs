// Claude Handler - /v1/messages, /v1/messages/count_tokens

use axum::{
    body::Body,
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::AppState;
use crate::proxy::agents::{inject_web_search_prompt, VISION_SYSTEM_PROMPT};
use crate::proxy::common::tokens::{estimate_conversation_tokens, estimate_request_tokens};
use crate::proxy::mappers::claude::{
    create_claude_sse_stream, transform_claude_request, transform_response, ClaudeRequest,
    CountTokensRequest,
};
use crate::proxy::mappers::openai::models::OpenAIResponse;
use crate::proxy::mappers::openai::{filter_empty_assistant_messages, normalize_tool_calls};
use crate::proxy::routing::{resolve_model, select_backend};
use crate::proxy::upstream::UpstreamError;

fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "type": "error",
            "error": {
                "type": error_type,
                "message": message
            }
        })),
    )
        .into_response()
}

fn upstream_error_response(err: &UpstreamError) -> Response {
    error_response(err.client_status(), "api_error", err.to_string())
}

/// Initial backend failure on a streaming request: the client already
/// expects SSE, so the error goes out as a single event stream.
fn sse_error_response(message: &str) -> Response {
    let event = json!({
        "type": "error",
        "error": {
            "type": "api_error",
            "message": message
        }
    });
    let body = format!("event: error\ndata: {}\n\n", event);
    sse_response(Body::from(body))
}

pub(crate) fn sse_response(body: Body) -> Response {
    Response::builder()
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Serialize the backend request and apply wire-level normalization on the
/// raw JSON: tool-call repair and empty assistant message removal.
fn normalized_body(openai_req: &impl serde::Serialize) -> Result<Value, String> {
    let mut body = serde_json::to_value(openai_req).map_err(|e| e.to_string())?;
    if let Some(messages) = body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        normalize_tool_calls(messages);
        filter_empty_assistant_messages(messages);
    }
    Ok(body)
}

/// Handle Claude Messages: POST /v1/messages
pub async fn handle_messages(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let trace_id = format!("msg_{}", chrono::Utc::now().timestamp_subsec_millis());

    let mut request: ClaudeRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                format!("Invalid request body: {}", e),
            );
        }
    };

    info!(
        "[{}] Messages request | Model: {} | Stream: {} | Messages: {}",
        trace_id,
        request.model,
        request.stream,
        request.messages.len(),
    );

    if state.config.web_search_prompt {
        inject_web_search_prompt(&mut request);
    }

    let selection = select_backend(&state.config, &mut request);

    let effective_model = match resolve_model(
        selection.backend,
        &request.model,
        &state.upstream,
        &state.discovery,
    )
    .await
    {
        Ok(m) => m,
        Err(e) => {
            debug!("[{}] Model resolution failed: {}", trace_id, e);
            return if request.stream {
                sse_error_response(&e.to_string())
            } else {
                upstream_error_response(&e)
            };
        }
    };

    // Seeds message_start usage; backends only report usage at stream end
    let input_estimate = estimate_conversation_tokens(
        &request.messages,
        request.system.as_ref(),
        request.tools.as_deref(),
    );

    let extra_system = selection.is_vision.then_some(VISION_SYSTEM_PROMPT);

    let openai_req = match transform_claude_request(&request, &effective_model, extra_system) {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                format!("Transform error: {}", e),
            );
        }
    };

    let body = match normalized_body(&openai_req) {
        Ok(b) => b,
        Err(e) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "api_error", e);
        }
    };

    let response = match state.upstream.chat_completions(selection.backend, &body).await {
        Ok(r) => r,
        Err(e) => {
            debug!("[{}] Backend request failed: {}", trace_id, e);
            return if request.stream {
                sse_error_response(&e.to_string())
            } else {
                upstream_error_response(&e)
            };
        }
    };

    if request.stream {
        let claude_stream = create_claude_sse_stream(
            Box::pin(response.bytes_stream()),
            request.model.clone(),
            input_estimate,
        );
        return sse_response(Body::from_stream(claude_stream));
    }

    let openai_resp: OpenAIResponse = match response.json().await {
        Ok(r) => r,
        Err(e) => {
            return error_response(
                StatusCode::BAD_GATEWAY,
                "api_error",
                format!("Backend returned unparseable response: {}", e),
            );
        }
    };

    match transform_response(&openai_resp, &request.model) {
        Ok(claude_resp) => (StatusCode::OK, Json(claude_resp)).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "api_error",
            format!("Transform error: {}", e),
        ),
    }
}

/// Handle Claude Token Count: POST /v1/messages/count_tokens
///
/// Accepts the permissive subset shape; a bare `{}` counts as zero.
pub async fn handle_count_tokens(
    State(_state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, Response> {
    let request: CountTokensRequest = serde_json::from_value(body).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            format!("Invalid request: {}", e),
        )
    })?;

    let input_tokens = estimate_request_tokens(&request);

    Ok(Json(json!({ "input_tokens": input_tokens })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_body_repairs_tool_calls() {
        let req = json!({
            "model": "m",
            "messages": [
                {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "t", "arguments": "not json"}
                    }]
                },
                {"role": "assistant", "content": null}
            ]
        });

        let body = normalized_body(&req).unwrap();
        let messages = body["messages"].as_array().unwrap();
        // Empty assistant message dropped
        assert_eq!(messages.len(), 1);
        let call = &messages[0]["tool_calls"][0];
        assert!(call.get("index").is_none());
        assert_eq!(call["function"]["arguments"], "{}");
    }

    #[test]
    fn test_sse_error_response_shape() {
        let resp = sse_error_response("backend down");
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "text/event-stream"
        );
    }

    #[test]
    fn test_error_response_status() {
        let resp = error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "bad".to_string(),
        );
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
