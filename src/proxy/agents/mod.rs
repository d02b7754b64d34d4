pub mod vision;
pub mod web_search;

pub use vision::VISION_SYSTEM_PROMPT;
pub use web_search::{inject_web_search_prompt, WEB_SEARCH_SYSTEM_PROMPT};
