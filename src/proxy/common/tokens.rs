// Token estimation for count_tokens and streaming usage seeds.
//
// Counts the textual content of a request with the cl100k_base tokenizer.
// When the tokenizer cannot be constructed the count degrades to the common
// 4-characters-per-token heuristic.

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

use crate::proxy::mappers::claude::models::{
    ContentBlock, CountTokensRequest, Message, MessageContent, SystemPrompt, Tool,
};

static BPE: Lazy<Option<CoreBPE>> = Lazy::new(|| tiktoken_rs::cl100k_base().ok());

/// Count tokens in a text, falling back to ceil(len / 4).
pub fn count_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    match BPE.as_ref() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len() as u32,
        None => (text.len() as f64 / 4.0).ceil() as u32,
    }
}

/// Estimate input tokens for a conversation: message content plus system
/// prompt plus tool definitions. An empty request counts as zero.
pub fn estimate_conversation_tokens(
    messages: &[Message],
    system: Option<&SystemPrompt>,
    tools: Option<&[Tool]>,
) -> u32 {
    let mut total: u32 = 0;

    if let Some(system) = system {
        match system {
            SystemPrompt::String(text) => total += count_tokens(text),
            SystemPrompt::Array(blocks) => {
                for block in blocks {
                    total += count_tokens(&block.text);
                }
            }
        }
    }

    for msg in messages {
        match &msg.content {
            MessageContent::String(text) => total += count_tokens(text),
            MessageContent::Array(blocks) => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => total += count_tokens(text),
                        ContentBlock::ToolUse { name, input, .. } => {
                            total += count_tokens(name);
                            total += count_tokens(&input.to_string());
                        }
                        ContentBlock::ToolResult { content, .. } => {
                            total += count_tokens(&content.to_string());
                        }
                        // Images and unknown blocks carry no countable text
                        _ => {}
                    }
                }
            }
        }
    }

    if let Some(tools) = tools {
        for tool in tools {
            total += count_tokens(&tool.name);
            if let Some(desc) = &tool.description {
                total += count_tokens(desc);
            }
            if let Some(schema) = &tool.input_schema {
                total += count_tokens(&schema.to_string());
            }
        }
    }

    total
}

/// Estimate tokens for a count_tokens request.
pub fn estimate_request_tokens(request: &CountTokensRequest) -> u32 {
    estimate_conversation_tokens(
        &request.messages,
        request.system.as_ref(),
        request.tools.as_deref(),
    )
}
