// Streaming response transformation (OpenAI SSE → Anthropic Messages SSE)
//
// The backend emits chat-completion chunks: text deltas, tool-call argument
// fragments keyed by a call index, a finish reason, and (with
// stream_options.include_usage) a final usage-only chunk. The converter
// re-expresses them as the Anthropic event sequence: message_start, then for
// each content index exactly one content_block_start, one or more
// content_block_delta, one content_block_stop, and finally message_delta
// plus message_stop.

use super::response::map_stop_reason;
use crate::proxy::mappers::openai::models::{DeltaToolCall, OpenAIUsage, StreamChunk};
use crate::proxy::mappers::openai::sanitize_tool_name;
use bytes::Bytes;
use serde_json::{json, Value};

/// Block type in the streaming state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    None,
    Text,
    Tool,
}

/// Streaming state machine for Anthropic SSE conversion
pub struct StreamingState {
    block_type: BlockType,
    pub block_index: usize,
    pub message_start_sent: bool,
    pub message_stop_sent: bool,
    used_tool: bool,
    /// Backend tool-call index the currently open tool block belongs to.
    current_tool_index: Option<u32>,
    /// Characters emitted so far, for the output-token fallback estimate.
    emitted_chars: usize,
    requested_model: String,
    message_id: String,
    input_tokens: u32,
    finish_reason: Option<String>,
    usage: Option<OpenAIUsage>,
}

impl StreamingState {
    pub fn new(requested_model: String, input_tokens: u32) -> Self {
        Self {
            block_type: BlockType::None,
            block_index: 0,
            message_start_sent: false,
            message_stop_sent: false,
            used_tool: false,
            current_tool_index: None,
            emitted_chars: 0,
            requested_model,
            message_id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            input_tokens,
            finish_reason: None,
            usage: None,
        }
    }

    /// Emit an SSE event
    pub fn emit(&self, event_type: &str, data: Value) -> Bytes {
        let sse = format!(
            "event: {}\ndata: {}\n\n",
            event_type,
            serde_json::to_string(&data).unwrap_or_default()
        );
        Bytes::from(sse)
    }

    /// Emit message_start, seeded with the precomputed input-token estimate
    pub fn emit_message_start(&mut self) -> Bytes {
        if self.message_start_sent {
            return Bytes::new();
        }

        let result = self.emit(
            "message_start",
            json!({
                "type": "message_start",
                "message": {
                    "id": self.message_id,
                    "type": "message",
                    "role": "assistant",
                    "content": [],
                    "model": self.requested_model,
                    "stop_reason": null,
                    "stop_sequence": null,
                    "usage": { "input_tokens": self.input_tokens, "output_tokens": 0 }
                }
            }),
        );
        self.message_start_sent = true;
        result
    }

    /// Start a new content block, closing any open one first
    pub fn start_block(&mut self, block_type: BlockType, content_block: Value) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        if self.block_type != BlockType::None {
            chunks.extend(self.end_block());
        }

        chunks.push(self.emit(
            "content_block_start",
            json!({
                "type": "content_block_start",
                "index": self.block_index,
                "content_block": content_block
            }),
        ));

        self.block_type = block_type;
        chunks
    }

    /// End the current content block
    pub fn end_block(&mut self) -> Vec<Bytes> {
        if self.block_type == BlockType::None {
            return vec![];
        }

        let chunk = self.emit(
            "content_block_stop",
            json!({ "type": "content_block_stop", "index": self.block_index }),
        );

        self.block_index += 1;
        self.block_type = BlockType::None;
        self.current_tool_index = None;
        vec![chunk]
    }

    /// Emit a delta event for the open block
    pub fn emit_delta(&self, delta: Value) -> Bytes {
        self.emit(
            "content_block_delta",
            json!({
                "type": "content_block_delta",
                "index": self.block_index,
                "delta": delta
            }),
        )
    }

    pub fn note_finish_reason(&mut self, finish_reason: &str) {
        self.finish_reason = Some(finish_reason.to_string());
    }

    pub fn note_usage(&mut self, usage: OpenAIUsage) {
        self.usage = Some(usage);
    }

    /// Emit finish events (message_delta + message_stop)
    ///
    /// Usage prefers what the backend reported; without it the output count
    /// falls back to ceil(emitted chars / 4) and the input count to the
    /// seeded estimate.
    pub fn emit_finish(&mut self) -> Vec<Bytes> {
        let mut chunks = Vec::new();

        chunks.extend(self.end_block());

        let stop_reason = match self.finish_reason.as_deref() {
            Some(reason) => map_stop_reason(reason),
            None if self.used_tool => "tool_use".to_string(),
            None => "end_turn".to_string(),
        };

        let (input_tokens, output_tokens) = match &self.usage {
            Some(u) => (u.prompt_tokens, u.completion_tokens),
            None => (
                self.input_tokens,
                (self.emitted_chars as f64 / 4.0).ceil() as u32,
            ),
        };

        chunks.push(self.emit(
            "message_delta",
            json!({
                "type": "message_delta",
                "delta": { "stop_reason": stop_reason, "stop_sequence": null },
                "usage": { "input_tokens": input_tokens, "output_tokens": output_tokens }
            }),
        ));

        if !self.message_stop_sent {
            chunks.push(Bytes::from(
                "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
            ));
            self.message_stop_sent = true;
        }

        chunks
    }

    fn process_text(&mut self, text: &str) -> Vec<Bytes> {
        let mut chunks = Vec::new();

        if text.is_empty() {
            return chunks;
        }

        if self.block_type != BlockType::Text {
            chunks.extend(
                self.start_block(BlockType::Text, json!({ "type": "text", "text": "" })),
            );
        }

        self.emitted_chars += text.chars().count();
        chunks.push(self.emit_delta(json!({ "type": "text_delta", "text": text })));
        chunks
    }

    fn process_tool_call(&mut self, tc: &DeltaToolCall) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        self.used_tool = true;

        let call_index = tc.index.unwrap_or(0);
        let needs_new_block =
            self.block_type != BlockType::Tool || self.current_tool_index != Some(call_index);

        if needs_new_block {
            let tool_id = tc
                .id
                .clone()
                .unwrap_or_else(|| format!("toolu_{}", uuid::Uuid::new_v4().simple()));
            let name = sanitize_tool_name(
                tc.function
                    .as_ref()
                    .and_then(|f| f.name.as_deref())
                    .unwrap_or(""),
            );

            chunks.extend(self.start_block(
                BlockType::Tool,
                json!({ "type": "tool_use", "id": tool_id, "name": name, "input": {} }),
            ));
            self.current_tool_index = Some(call_index);
        }

        if let Some(args) = tc.function.as_ref().and_then(|f| f.arguments.as_deref()) {
            if !args.is_empty() {
                self.emitted_chars += args.chars().count();
                chunks.push(
                    self.emit_delta(json!({ "type": "input_json_delta", "partial_json": args })),
                );
            }
        }

        chunks
    }
}

/// Create an Anthropic SSE stream from a backend chat-completions SSE stream.
///
/// `input_tokens` seeds message_start and serves as the usage fallback when
/// the backend never reports usage.
pub fn create_claude_sse_stream(
    mut openai_stream: std::pin::Pin<
        Box<dyn futures::Stream<Item = Result<Bytes, reqwest::Error>> + Send>,
    >,
    requested_model: String,
    input_tokens: u32,
) -> std::pin::Pin<Box<dyn futures::Stream<Item = Result<Bytes, String>> + Send>> {
    use bytes::BytesMut;
    use futures::StreamExt;

    Box::pin(async_stream::stream! {
        let mut state = StreamingState::new(requested_model, input_tokens);
        let mut buffer = BytesMut::new();

        while let Some(chunk_result) = openai_stream.next().await {
            match chunk_result {
                Ok(chunk) => {
                    buffer.extend_from_slice(&chunk);

                    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line_raw = buffer.split_to(pos + 1);
                        if let Ok(line_str) = std::str::from_utf8(&line_raw) {
                            let line = line_str.trim();
                            if line.is_empty() { continue; }

                            if let Some(sse_chunks) = process_sse_line(line, &mut state) {
                                for sse_chunk in sse_chunks {
                                    yield Ok(sse_chunk);
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    // Close the stream cleanly: open block stopped, one error
                    // event, then normal termination events.
                    for sse_chunk in emit_stream_error(&mut state, &e.to_string()) {
                        yield Ok(sse_chunk);
                    }
                    return;
                }
            }
        }

        // Flush remaining buffer
        if !buffer.is_empty() {
            if let Ok(line_str) = std::str::from_utf8(&buffer) {
                let line = line_str.trim();
                if !line.is_empty() {
                    if let Some(sse_chunks) = process_sse_line(line, &mut state) {
                        for sse_chunk in sse_chunks {
                            yield Ok(sse_chunk);
                        }
                    }
                }
            }
            buffer.clear();
        }

        // Ensure termination events are sent
        for chunk in emit_force_stop(&mut state) {
            yield Ok(chunk);
        }
    })
}

/// Process a single SSE line from the backend stream
fn process_sse_line(line: &str, state: &mut StreamingState) -> Option<Vec<Bytes>> {
    let data_str = line.strip_prefix("data: ")?.trim();
    if data_str.is_empty() {
        return None;
    }

    if data_str == "[DONE]" {
        let chunks = emit_force_stop(state);
        return if chunks.is_empty() { None } else { Some(chunks) };
    }

    let chunk: StreamChunk = match serde_json::from_str(data_str) {
        Ok(c) => c,
        Err(_) => return None,
    };

    let mut chunks = Vec::new();

    if !state.message_start_sent {
        chunks.push(state.emit_message_start());
    }

    if let Some(usage) = chunk.usage {
        state.note_usage(usage);
    }

    // Secondary choices are not requested and not converted
    if let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) {
        if let Some(tool_calls) = &choice.delta.tool_calls {
            for tc in tool_calls {
                chunks.extend(state.process_tool_call(tc));
            }
        }

        if let Some(text) = &choice.delta.content {
            chunks.extend(state.process_text(text));
        }

        if let Some(finish_reason) = &choice.finish_reason {
            // The usage chunk may still follow; hold the finish events
            // until [DONE] or stream end.
            state.note_finish_reason(finish_reason);
        }
    }

    if chunks.is_empty() {
        None
    } else {
        Some(chunks)
    }
}

/// Emit termination events if not already sent
pub fn emit_force_stop(state: &mut StreamingState) -> Vec<Bytes> {
    if state.message_stop_sent {
        return vec![];
    }

    let mut chunks = Vec::new();
    if !state.message_start_sent {
        chunks.push(state.emit_message_start());
    }
    chunks.extend(state.emit_finish());
    chunks
}

/// Abort path: close any open block, surface one error event, then end the
/// message cleanly.
pub fn emit_stream_error(state: &mut StreamingState, message: &str) -> Vec<Bytes> {
    let mut chunks = Vec::new();

    if !state.message_start_sent {
        chunks.push(state.emit_message_start());
    }
    chunks.extend(state.end_block());
    chunks.push(state.emit(
        "error",
        json!({
            "type": "error",
            "error": { "type": "api_error", "message": message }
        }),
    ));
    chunks.extend(state.emit_finish());
    chunks
}
