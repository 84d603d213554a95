//! Parse model replies into structured intent candidates
//!
//! The model is asked for a single JSON object naming an action kind and
//! its parameters. Parsing is strict: either the reply yields a well-formed
//! `LlmReply` or it is an error. Schema validation against the catalog
//! happens afterwards in the resolver.

use crate::actions::catalog::{ActionCatalog, Parameters};
use crate::core::error::{AssistError, Result};
use crate::llm::context::{truncate, PromptContext};
use serde::{Deserialize, Serialize};

/// Longest slice of a raw reply quoted in parse errors
const MAX_REPLY_EXCERPT: usize = 200;

/// Structured reply expected from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmReply {
    /// Catalog kind (or alias) of the chosen action
    pub action: String,
    #[serde(default)]
    pub parameters: Parameters,
    /// Model's confidence in the interpretation (0.0 - 1.0)
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Message for the user, used as the success reply text
    #[serde(default)]
    pub response: Option<String>,
}

/// Parse a raw completion into an `LlmReply`
pub fn parse_reply(response: &str) -> Result<LlmReply> {
    let json_str = extract_json(response)?;

    let reply: LlmReply = serde_json::from_str(json_str).map_err(|e| {
        AssistError::Llm(format!(
            "Failed to parse reply: {} - Response: {}",
            e,
            truncate(response.to_string(), MAX_REPLY_EXCERPT)
        ))
    })?;

    if reply.action.trim().is_empty() {
        return Err(AssistError::Llm("Reply names no action".into()));
    }
    if let Some(c) = reply.confidence {
        if !c.is_finite() {
            return Err(AssistError::Llm(format!("Invalid confidence: {}", c)));
        }
    }

    Ok(reply)
}

/// Extract JSON object from LLM response (handles surrounding text and fences)
pub fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| AssistError::Llm("No JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| AssistError::Llm("No closing brace found in response".into()))?;
    if end < start {
        return Err(AssistError::Llm("Malformed JSON in response".into()));
    }
    Ok(&response[start..=end])
}

/// System prompt listing every catalog kind with its parameter schema
pub fn build_system_prompt(catalog: &ActionCatalog) -> String {
    let mut actions = String::new();
    for spec in catalog.specs() {
        actions.push_str(&format!("- {}", spec.signature()));
        if !spec.description.is_empty() {
            actions.push_str(&format!(" - {}", spec.description));
        }
        actions.push('\n');
    }
    format!("{}\nAVAILABLE ACTIONS:\n{}\n{}", SYSTEM_PREAMBLE, actions, SYSTEM_FORMAT)
}

/// User prompt: bounded context plus the command itself
pub fn build_user_prompt(command: &str, context: &PromptContext) -> String {
    format!(
        "CONTEXT:\n{}\nUSER COMMAND:\n{}\n\nResolve this command into JSON:",
        context.summary(),
        command
    )
}

const SYSTEM_PREAMBLE: &str = r#"You are the intent resolver of a desktop personal assistant.
Map the user's command to exactly ONE of the available actions and extract its parameters.
Parameters marked with ? are optional. Never invent actions that are not listed."#;

const SYSTEM_FORMAT: &str = r#"RULES:
- "play", "watch", "listen", "put on" mean play_media; only an explicit "search" means search_media.
- Opening a site by name ("open youtube") is open_website, not launch_app.
- If a required parameter cannot be determined, still return the action and omit that parameter.

OUTPUT FORMAT (JSON only, no markdown, no explanation):
{
  "action": "action_kind",
  "parameters": {"name": "value"},
  "confidence": 0.0-1.0,
  "reasoning": "why this action",
  "response": "short message for the user"
}

Examples:
"open chrome" -> {"action": "launch_app", "parameters": {"name": "chrome"}, "confidence": 0.95, "reasoning": "app name", "response": "Opening Chrome"}
"play despacito" -> {"action": "play_media", "parameters": {"query": "despacito"}, "confidence": 0.95, "reasoning": "play keyword", "response": "Playing despacito"}
"scroll down a bit" -> {"action": "scroll", "parameters": {"direction": "down", "amount": 2}, "confidence": 0.9, "reasoning": "scroll request", "response": "Scrolling down"}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_simple() {
        let response = r#"{"action": "play_media", "parameters": {"query": "jazz"}}"#;
        let json = extract_json(response).unwrap();
        assert_eq!(json, response);
    }

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let response = r#"Here is the resolved command:
```json
{"action": "launch_app", "parameters": {"name": "chrome"}, "confidence": 0.9}
```
Let me know if you need anything else."#;
        let json = extract_json(response).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
        assert!(json.contains("launch_app"));
    }

    #[test]
    fn test_extract_json_no_json() {
        assert!(extract_json("I don't understand that command").is_err());
        assert!(extract_json("} backwards {").is_err());
    }

    #[test]
    fn test_parse_full_reply() {
        let reply = parse_reply(
            r#"{
                "action": "search_files",
                "parameters": {"query": "resume", "file_type": "pdf"},
                "confidence": 0.85,
                "reasoning": "file search",
                "response": "Looking for your resume"
            }"#,
        )
        .unwrap();
        assert_eq!(reply.action, "search_files");
        assert_eq!(reply.parameters["query"], "resume");
        assert!((reply.confidence.unwrap() - 0.85).abs() < 0.001);
        assert_eq!(reply.response.as_deref(), Some("Looking for your resume"));
    }

    #[test]
    fn test_parse_minimal_reply() {
        let reply = parse_reply(r#"{"action": "analyze_screen"}"#).unwrap();
        assert!(reply.parameters.is_empty());
        assert!(reply.confidence.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_structure() {
        // parameters must be an object
        assert!(parse_reply(r#"{"action": "scroll", "parameters": ["down"]}"#).is_err());
        // action must be present and non-empty
        assert!(parse_reply(r#"{"parameters": {}}"#).is_err());
        assert!(parse_reply(r#"{"action": "  "}"#).is_err());
        // truncated output
        assert!(parse_reply(r#"{"action": "scroll", "parameters": {"#).is_err());
    }

    #[test]
    fn test_parse_error_quotes_bounded_excerpt() {
        let padding = "x".repeat(5000);
        let raw = format!(r#"{{"action": "scroll", "parameters": ["{}"]}}"#, padding);
        let message = parse_reply(&raw).unwrap_err().to_string();
        assert!(message.contains("Failed to parse reply"));
        assert!(message.ends_with('…'));
        assert!(message.chars().count() < MAX_REPLY_EXCERPT + 200);
    }

    #[test]
    fn test_system_prompt_lists_catalog() {
        let catalog = ActionCatalog::builtin();
        let prompt = build_system_prompt(&catalog);
        for spec in catalog.specs() {
            assert!(prompt.contains(&spec.kind), "missing {}", spec.kind);
        }
        assert!(prompt.contains("search_files(query: string, file_type?: string, max_results?: integer)"));
    }

    #[test]
    fn test_user_prompt_contains_command_and_context() {
        let mut ctx = PromptContext::empty(5);
        ctx.add_turn("\"find my resume\" -> search_files (ok)");
        let prompt = build_user_prompt("open the first one", &ctx);
        assert!(prompt.contains("open the first one"));
        assert!(prompt.contains("find my resume"));
    }
}
