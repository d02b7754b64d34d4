// Anthropic Messages → OpenAI chat-completions request transformation

use super::models::*;
use crate::proxy::mappers::openai::models::{
    OpenAIContent, OpenAIContentBlock, OpenAIImageUrl, OpenAIMessage, OpenAIRequest, StreamOptions,
    ToolCall, ToolFunction,
};
use crate::proxy::mappers::openai::sanitize_tool_name;
use serde_json::{json, Value};

/// Transform an Anthropic Messages request into an OpenAI chat-completions
/// request for the given effective model.
///
/// `extra_system` is prepended as its own system message ahead of the
/// conversation (used for the vision backend's instructional prompt).
pub fn transform_claude_request(
    claude_req: &ClaudeRequest,
    model: &str,
    extra_system: Option<&str>,
) -> Result<OpenAIRequest, String> {
    let mut messages: Vec<OpenAIMessage> = Vec::new();

    // 1. System messages
    if let Some(extra) = extra_system {
        if !extra.is_empty() {
            messages.push(OpenAIMessage::text("system", extra));
        }
    }
    if let Some(system_text) = build_system_text(&claude_req.system) {
        messages.push(OpenAIMessage::text("system", system_text));
    }

    // 2. Conversation messages
    for msg in &claude_req.messages {
        match msg.role.as_str() {
            "assistant" => messages.push(build_assistant_message(msg)?),
            _ => build_user_messages(msg, &mut messages),
        }
    }

    // 3. Ordering repairs on the assembled list
    fix_tool_user_adjacency(&mut messages);
    fix_trailing_assistant(&mut messages);

    // 4. Tool definitions
    let tools = build_tools(&claude_req.tools);

    // tool_choice without tools fails backend validation
    let tool_choice = if tools.is_some() {
        claude_req.tool_choice.clone()
    } else {
        None
    };

    // 5. Sampling parameters and streaming
    let stream_options = if claude_req.stream {
        Some(StreamOptions { include_usage: true })
    } else {
        None
    };

    let stop = claude_req
        .stop_sequences
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|s| json!(s));

    Ok(OpenAIRequest {
        model: model.to_string(),
        messages,
        stream: claude_req.stream,
        stream_options,
        max_tokens: claude_req.max_tokens,
        temperature: claude_req.temperature,
        top_p: claude_req.top_p,
        stop,
        tools,
        tool_choice,
    })
}

/// Join the system prompt into a single string, blank-line separated,
/// dropping empty text blocks.
fn build_system_text(system: &Option<SystemPrompt>) -> Option<String> {
    let text = match system {
        Some(SystemPrompt::String(text)) => text.clone(),
        Some(SystemPrompt::Array(blocks)) => blocks
            .iter()
            .filter(|b| b.block_type == "text" && !b.text.is_empty())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
        None => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// One assistant source message becomes one backend message: text blocks
/// aggregate into content, tool_use blocks into tool_calls.
fn build_assistant_message(msg: &Message) -> Result<OpenAIMessage, String> {
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    match &msg.content {
        MessageContent::String(text) => {
            if !text.is_empty() {
                text_parts.push(text.clone());
            }
        }
        MessageContent::Array(blocks) => {
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => {
                        if !text.is_empty() {
                            text_parts.push(text.clone());
                        }
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        let arguments = if input.is_null() {
                            "{}".to_string()
                        } else {
                            input.to_string()
                        };
                        tool_calls.push(ToolCall {
                            id: id.clone(),
                            r#type: "function".to_string(),
                            function: ToolFunction {
                                name: sanitize_tool_name(name),
                                arguments,
                            },
                        });
                    }
                    ContentBlock::ToolResult { .. } => {
                        return Err(
                            "tool_result block in assistant message".to_string()
                        );
                    }
                    ContentBlock::Image { .. } => {
                        // Assistant-authored images have no backend equivalent
                        text_parts.push("[Image]".to_string());
                    }
                    ContentBlock::Unknown(_) => {
                        text_parts.push(unknown_block_note(block));
                    }
                }
            }
        }
    }

    let content = if text_parts.is_empty() {
        None
    } else {
        Some(OpenAIContent::String(text_parts.join("\n\n")))
    };

    Ok(OpenAIMessage {
        role: "assistant".to_string(),
        content,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        tool_call_id: None,
        name: None,
    })
}

/// Fan a user source message out into backend messages.
///
/// Non-tool blocks are emitted first as a single user message, then each
/// tool_result becomes its own `tool`-role message. This keeps the tool
/// result as the turn boundary, so a `user` message never directly follows
/// a `tool` message.
fn build_user_messages(msg: &Message, out: &mut Vec<OpenAIMessage>) {
    let blocks = match &msg.content {
        MessageContent::String(text) => {
            out.push(OpenAIMessage::text(&msg.role, text.clone()));
            return;
        }
        MessageContent::Array(blocks) => blocks,
    };

    let mut parts: Vec<OpenAIContentBlock> = Vec::new();
    let mut tool_results: Vec<(String, String)> = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => {
                parts.push(OpenAIContentBlock::Text { text: text.clone() });
            }
            ContentBlock::Image { source } => {
                parts.push(OpenAIContentBlock::ImageUrl {
                    image_url: OpenAIImageUrl {
                        url: format!(
                            "data:{};base64,{}",
                            source.media_type, source.data
                        ),
                    },
                });
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                tool_results.push((tool_use_id.clone(), tool_result_text(content)));
            }
            ContentBlock::ToolUse { .. } => {
                // A tool_use in a user message is malformed history; keep it
                // visible rather than dropping it silently.
                parts.push(OpenAIContentBlock::Text {
                    text: unknown_block_note(block),
                });
            }
            ContentBlock::Unknown(_) => {
                parts.push(OpenAIContentBlock::Text {
                    text: unknown_block_note(block),
                });
            }
        }
    }

    if !parts.is_empty() {
        out.push(OpenAIMessage {
            role: msg.role.clone(),
            content: Some(collapse_parts(parts)),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        });
    }

    for (tool_use_id, text) in tool_results {
        out.push(OpenAIMessage {
            role: "tool".to_string(),
            content: Some(OpenAIContent::String(text)),
            tool_calls: None,
            tool_call_id: Some(tool_use_id),
            name: None,
        });
    }
}

/// A lone text part collapses to plain string content.
fn collapse_parts(parts: Vec<OpenAIContentBlock>) -> OpenAIContent {
    if parts.len() == 1 {
        if let OpenAIContentBlock::Text { text } = &parts[0] {
            return OpenAIContent::String(text.clone());
        }
    }
    OpenAIContent::Array(parts)
}

/// Tool result payloads: strings pass through, anything else is serialized
/// to its canonical JSON text.
fn tool_result_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn unknown_block_note(block: &ContentBlock) -> String {
    format!("[Unsupported content block: {}]", block.block_type())
}

/// A user message must never directly follow a tool message. Per-message
/// fan-out guarantees this within one source message, but consecutive user
/// source turns (which the Anthropic API merges) can still assemble into
/// `tool, user`. Hoist the user message before the adjacent tool run, the
/// same position its text would take had the turns arrived merged.
fn fix_tool_user_adjacency(messages: &mut Vec<OpenAIMessage>) {
    let mut i = 1;
    while i < messages.len() {
        if messages[i].role == "user" && messages[i - 1].role == "tool" {
            let mut insert_at = i - 1;
            while insert_at > 0 && messages[insert_at - 1].role == "tool" {
                insert_at -= 1;
            }
            let user = messages.remove(i);
            messages.insert(insert_at, user);
        }
        i += 1;
    }
}

/// Append a synthetic user turn when the conversation ends on assistant.
fn fix_trailing_assistant(messages: &mut Vec<OpenAIMessage>) {
    if messages
        .last()
        .map(|m| m.role == "assistant")
        .unwrap_or(false)
    {
        messages.push(OpenAIMessage::text("user", "Continue."));
    }
}

/// Map Anthropic tool definitions to OpenAI function tools.
fn build_tools(tools: &Option<Vec<Tool>>) -> Option<Vec<Value>> {
    let tools = tools.as_ref().filter(|t| !t.is_empty())?;

    let mapped = tools
        .iter()
        .map(|tool| {
            let mut function = json!({
                "name": sanitize_tool_name(&tool.name),
            });
            if let Some(desc) = &tool.description {
                function["description"] = json!(desc);
            }
            function["parameters"] = tool
                .input_schema
                .clone()
                .unwrap_or_else(|| json!({"type": "object", "properties": {}}));

            json!({ "type": "function", "function": function })
        })
        .collect();

    Some(mapped)
}
