// OpenAI chat-completions → Anthropic Messages response transformation

use super::models::*;
use crate::proxy::mappers::openai::models::{
    OpenAIContent, OpenAIContentBlock, OpenAIMessage, OpenAIResponse, OpenAIUsage,
};
use crate::proxy::mappers::openai::sanitize_tool_name;
use serde_json::{json, Value};

/// Map a backend finish reason to an Anthropic stop reason.
/// Shared between the non-streaming and streaming paths.
pub fn map_stop_reason(finish_reason: &str) -> String {
    match finish_reason {
        "stop" => "end_turn".to_string(),
        "tool_calls" => "tool_use".to_string(),
        other => other.to_string(),
    }
}

pub fn to_claude_usage(usage: Option<&OpenAIUsage>) -> Usage {
    match usage {
        Some(u) => Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        },
        None => Usage {
            input_tokens: 0,
            output_tokens: 0,
        },
    }
}

/// Decode a tool-call argument string. Undecodable arguments are preserved
/// under a `raw` key instead of failing the response.
fn decode_tool_input(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(v) if v.is_object() => v,
        _ => json!({ "raw": arguments }),
    }
}

/// Collect content blocks from a backend assistant message.
fn build_content_blocks(message: &OpenAIMessage) -> Vec<ContentBlock> {
    let mut blocks: Vec<ContentBlock> = Vec::new();

    match &message.content {
        Some(OpenAIContent::String(text)) => {
            if !text.is_empty() {
                blocks.push(ContentBlock::Text { text: text.clone() });
            }
        }
        Some(OpenAIContent::Array(parts)) => {
            for part in parts {
                if let OpenAIContentBlock::Text { text } = part {
                    if !text.is_empty() {
                        blocks.push(ContentBlock::Text { text: text.clone() });
                    }
                }
            }
        }
        None => {}
    }

    if let Some(tool_calls) = &message.tool_calls {
        for call in tool_calls {
            blocks.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: sanitize_tool_name(&call.function.name),
                input: decode_tool_input(&call.function.arguments),
            });
        }
    }

    blocks
}

/// Transform a non-streaming backend response into an Anthropic response.
///
/// `requested_model` is echoed back so clients see the model string they
/// asked for rather than the backend's effective model.
pub fn transform_response(
    openai_resp: &OpenAIResponse,
    requested_model: &str,
) -> Result<ClaudeResponse, String> {
    let id = openai_resp
        .id
        .clone()
        .unwrap_or_else(|| format!("msg_{}", uuid::Uuid::new_v4().simple()));

    let (content, stop_reason) = match openai_resp.choices.first() {
        Some(choice) => {
            let blocks = build_content_blocks(&choice.message);
            let stop_reason = choice
                .finish_reason
                .as_deref()
                .map(map_stop_reason);
            (blocks, stop_reason)
        }
        // Zero choices is an explicit edge case, not an error
        None => (
            vec![ContentBlock::Text {
                text: String::new(),
            }],
            None,
        ),
    };

    Ok(ClaudeResponse {
        id,
        type_: "message".to_string(),
        role: "assistant".to_string(),
        model: requested_model.to_string(),
        content,
        stop_reason,
        stop_sequence: None,
        usage: to_claude_usage(openai_resp.usage.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::mappers::openai::models::{Choice, ToolCall, ToolFunction};

    fn make_response(message: OpenAIMessage, finish_reason: &str) -> OpenAIResponse {
        OpenAIResponse {
            id: Some("chatcmpl-1".to_string()),
            model: Some("qwen2.5-72b".to_string()),
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: Some(finish_reason.to_string()),
            }],
            usage: Some(OpenAIUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }
    }

    #[test]
    fn test_simple_text_response() {
        let resp = make_response(OpenAIMessage::text("assistant", "Hello!"), "stop");
        let result = transform_response(&resp, "claude-sonnet-4").unwrap();

        assert_eq!(result.role, "assistant");
        assert_eq!(result.model, "claude-sonnet-4");
        assert_eq!(result.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(
            result.content,
            vec![ContentBlock::Text {
                text: "Hello!".to_string()
            }]
        );
        assert_eq!(result.usage.input_tokens, 10);
        assert_eq!(result.usage.output_tokens, 5);
    }

    #[test]
    fn test_tool_calls_become_tool_use() {
        let message = OpenAIMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: "call_1".to_string(),
                r#type: "function".to_string(),
                function: ToolFunction {
                    name: "get_weather".to_string(),
                    arguments: "{\"city\":\"Tokyo\"}".to_string(),
                },
            }]),
            tool_call_id: None,
            name: None,
        };
        let resp = make_response(message, "tool_calls");
        let result = transform_response(&resp, "m").unwrap();

        assert_eq!(result.stop_reason.as_deref(), Some("tool_use"));
        match &result.content[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "get_weather");
                assert_eq!(input["city"], "Tokyo");
            }
            other => panic!("Expected ToolUse, got {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_arguments_fall_back_to_raw() {
        let message = OpenAIMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: "call_1".to_string(),
                r#type: "function".to_string(),
                function: ToolFunction {
                    name: "t".to_string(),
                    arguments: "{\"key\": \"val".to_string(),
                },
            }]),
            tool_call_id: None,
            name: None,
        };
        let resp = make_response(message, "tool_calls");
        let result = transform_response(&resp, "m").unwrap();

        match &result.content[0] {
            ContentBlock::ToolUse { input, .. } => {
                assert_eq!(input["raw"], "{\"key\": \"val");
            }
            other => panic!("Expected ToolUse, got {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_finish_reason_passes_through() {
        let resp = make_response(OpenAIMessage::text("assistant", "Cut off"), "length");
        let result = transform_response(&resp, "m").unwrap();
        assert_eq!(result.stop_reason.as_deref(), Some("length"));
    }

    #[test]
    fn test_zero_choices_yields_empty_text_block() {
        let resp = OpenAIResponse {
            id: None,
            model: None,
            choices: vec![],
            usage: None,
        };
        let result = transform_response(&resp, "m").unwrap();

        assert_eq!(
            result.content,
            vec![ContentBlock::Text {
                text: String::new()
            }]
        );
        assert!(result.stop_reason.is_none());
        assert_eq!(result.usage.input_tokens, 0);
        assert_eq!(result.usage.output_tokens, 0);
        assert!(result.id.starts_with("msg_"));
    }

    #[test]
    fn test_missing_usage_defaults_to_zero() {
        let mut resp = make_response(OpenAIMessage::text("assistant", "Hi"), "stop");
        resp.usage = None;
        let result = transform_response(&resp, "m").unwrap();
        assert_eq!(result.usage.input_tokens, 0);
        assert_eq!(result.usage.output_tokens, 0);
    }
}
