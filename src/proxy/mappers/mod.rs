// Mappers - protocol converters between Anthropic and OpenAI wire formats

pub mod claude;
pub mod openai;
