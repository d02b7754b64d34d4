// Image detection and removal for routing between text and vision backends.

use crate::proxy::mappers::claude::models::{ClaudeRequest, ContentBlock, MessageContent};

/// Whether the last message of a request carries an image block.
/// Vision routing keys off the latest turn only, not the whole history.
pub fn last_message_has_image(request: &ClaudeRequest) -> bool {
    match request.messages.last() {
        Some(msg) => match &msg.content {
            MessageContent::Array(blocks) => {
                blocks.iter().any(|b| matches!(b, ContentBlock::Image { .. }))
            }
            MessageContent::String(_) => false,
        },
        None => false,
    }
}

/// Whether any message in the request carries an image block.
pub fn has_any_image(request: &ClaudeRequest) -> bool {
    request.messages.iter().any(|msg| match &msg.content {
        MessageContent::Array(blocks) => {
            blocks.iter().any(|b| matches!(b, ContentBlock::Image { .. }))
        }
        MessageContent::String(_) => false,
    })
}

/// Remove image blocks from every message, for backends without vision
/// support. Returns the number of blocks removed.
///
/// A message whose content was entirely images becomes the placeholder
/// text `[Image removed]`. A message left with a single text block is
/// collapsed to plain string content.
pub fn strip_images(request: &mut ClaudeRequest) -> usize {
    let mut removed = 0;

    for msg in &mut request.messages {
        let blocks = match &mut msg.content {
            MessageContent::Array(blocks) => blocks,
            MessageContent::String(_) => continue,
        };

        let before = blocks.len();
        blocks.retain(|b| !matches!(b, ContentBlock::Image { .. }));
        removed += before - blocks.len();

        if blocks.len() == before {
            continue;
        }

        if blocks.is_empty() {
            msg.content = MessageContent::String("[Image removed]".to_string());
        } else if blocks.len() == 1 {
            if let ContentBlock::Text { text } = &blocks[0] {
                if !text.is_empty() {
                    msg.content = MessageContent::String(text.clone());
                }
            }
        }
    }

    removed
}
