// Web-search guidance injection.
//
// When enabled, every request gets a fixed system prompt steering the model
// toward MCP search tools for anything that needs current information.

use crate::proxy::mappers::claude::models::{ClaudeRequest, SystemPrompt};

pub const WEB_SEARCH_SYSTEM_PROMPT: &str = r#"# Web Search Guidelines

You have access to MCP web search tools. Use them for current information:

## Available MCP Search Tools

- **brave_web_search**: Search the web using Brave Search API
- **brave_local_search**: Search for local businesses and places
- **tavily_search**: Alternative web search via Tavily API
- **exa_search**: Semantic web search via Exa API

## When to Use Web Search

You MUST use a web search MCP tool when the user asks for:
- Latest versions, releases, or updates
- Current pricing, costs, or billing information
- Recent news, events, or developments
- Documentation, tutorials, or guides
- Comparisons, reviews, or evaluations
- Any information that may be outdated in your training data
- Real-time or location-specific information

## Important Rules

- ALWAYS use an MCP search tool for queries requiring current information
- Do NOT use deprecated "WebSearch" tool - use MCP tools instead
- Do NOT answer from memory when a search is appropriate
- Formulate clear, specific search queries
- Cite sources when providing information from searches

## Example Usage

To search for "latest Node.js version":
```
brave_web_search(query: "latest Node.js LTS version 2024")
```

Follow these guidelines EXACTLY."#;

/// Flatten the existing system prompt and append the web-search guidance.
/// Array systems are joined with blank lines for backend compatibility.
pub fn inject_web_search_prompt(request: &mut ClaudeRequest) {
    if request.messages.is_empty() {
        return;
    }

    let existing = match &request.system {
        Some(SystemPrompt::String(text)) => text.clone(),
        Some(SystemPrompt::Array(blocks)) => blocks
            .iter()
            .map(|b| b.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        None => String::new(),
    };

    let combined = if existing.is_empty() {
        WEB_SEARCH_SYSTEM_PROMPT.to_string()
    } else {
        format!("{}\n\n{}", existing, WEB_SEARCH_SYSTEM_PROMPT)
    };

    request.system = Some(SystemPrompt::String(combined));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::mappers::claude::models::{Message, MessageContent, SystemBlock};

    fn request(system: Option<SystemPrompt>) -> ClaudeRequest {
        ClaudeRequest {
            model: "m".to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: MessageContent::String("Hi".to_string()),
            }],
            system,
            tools: None,
            tool_choice: None,
            stream: false,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
            metadata: None,
        }
    }

    #[test]
    fn test_injects_when_no_system() {
        let mut req = request(None);
        inject_web_search_prompt(&mut req);
        match &req.system {
            Some(SystemPrompt::String(s)) => assert_eq!(s, WEB_SEARCH_SYSTEM_PROMPT),
            other => panic!("Expected string system, got {:?}", other),
        }
    }

    #[test]
    fn test_appends_to_string_system() {
        let mut req = request(Some(SystemPrompt::String("Be brief.".to_string())));
        inject_web_search_prompt(&mut req);
        match &req.system {
            Some(SystemPrompt::String(s)) => {
                assert!(s.starts_with("Be brief.\n\n"));
                assert!(s.ends_with("EXACTLY."));
            }
            other => panic!("Expected string system, got {:?}", other),
        }
    }

    #[test]
    fn test_flattens_array_system() {
        let mut req = request(Some(SystemPrompt::Array(vec![
            SystemBlock {
                block_type: "text".to_string(),
                text: "First.".to_string(),
            },
            SystemBlock {
                block_type: "text".to_string(),
                text: "Second.".to_string(),
            },
        ])));
        inject_web_search_prompt(&mut req);
        match &req.system {
            Some(SystemPrompt::String(s)) => {
                assert!(s.starts_with("First.\n\nSecond.\n\n# Web Search"));
            }
            other => panic!("Expected string system, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_conversation_untouched() {
        let mut req = request(None);
        req.messages.clear();
        inject_web_search_prompt(&mut req);
        assert!(req.system.is_none());
    }
}
