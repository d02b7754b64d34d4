// OpenAI-side wire types and backend-bound message repair

pub mod models;
pub mod normalize;

pub use models::*;
pub use normalize::{
    filter_empty_assistant_messages, normalize_tool_calls, sanitize_tool_name,
};
