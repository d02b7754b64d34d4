// Tool-call repair for backend-bound message lists.
//
// vLLM rejects requests whose history carries artifacts of its own streaming
// output: transport `index` fields inside tool_calls, truncated argument
// JSON, and assistant turns that ended up with neither content nor calls.
// These fixes run on the raw JSON messages right before dispatch.

use serde_json::Value;

/// Maximum length of a sanitized tool name.
const MAX_TOOL_NAME_LEN: usize = 64;

/// Fallback name when sanitization leaves nothing.
const UNKNOWN_TOOL_NAME: &str = "unknown_tool";

/// Sanitize a tool name to the `[A-Za-z0-9_-]` alphabet backends accept.
///
/// Trims surrounding whitespace, replaces every other character with `_`,
/// truncates to 64 characters, and maps an empty result to `unknown_tool`.
/// Idempotent: applying it twice gives the same result.
pub fn sanitize_tool_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return UNKNOWN_TOOL_NAME.to_string();
    }

    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TOOL_NAME_LEN)
        .collect()
}

/// Repair tool_calls on assistant messages in place.
///
/// Strips the streaming transport `index` field and replaces argument
/// strings that are not valid JSON (truncated, null, missing) with `"{}"`.
/// Valid argument strings pass through byte-for-byte.
pub fn normalize_tool_calls(messages: &mut [Value]) {
    for msg in messages.iter_mut() {
        if msg.get("role").and_then(|r| r.as_str()) != Some("assistant") {
            continue;
        }
        let Some(tool_calls) = msg.get_mut("tool_calls").and_then(|t| t.as_array_mut()) else {
            continue;
        };

        for call in tool_calls.iter_mut() {
            let Some(obj) = call.as_object_mut() else {
                continue;
            };
            obj.remove("index");

            let Some(function) = obj.get_mut("function").and_then(|f| f.as_object_mut()) else {
                continue;
            };

            let valid = function
                .get("arguments")
                .and_then(|a| a.as_str())
                .map(|s| serde_json::from_str::<Value>(s).is_ok())
                .unwrap_or(false);

            if !valid {
                function.insert("arguments".to_string(), Value::String("{}".to_string()));
            }
        }
    }
}

/// Drop assistant messages that carry neither content nor tool calls.
/// Backends reject such turns as malformed history.
pub fn filter_empty_assistant_messages(messages: &mut Vec<Value>) {
    messages.retain(|msg| {
        if msg.get("role").and_then(|r| r.as_str()) != Some("assistant") {
            return true;
        }

        let has_tool_calls = msg
            .get("tool_calls")
            .and_then(|t| t.as_array())
            .map(|a| !a.is_empty())
            .unwrap_or(false);
        if has_tool_calls {
            return true;
        }

        match msg.get("content") {
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(parts)) => !parts.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    });
}
