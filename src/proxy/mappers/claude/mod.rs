// Claude mapper module
// Handles Anthropic Messages ↔ OpenAI chat-completions conversion

pub mod models;
pub mod request;
pub mod response;
pub mod streaming;

pub use models::*;
pub use request::transform_claude_request;
pub use response::{map_stop_reason, transform_response};
pub use streaming::{create_claude_sse_stream, StreamingState};
