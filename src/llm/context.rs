//! Gather conversation context for LLM prompts
//!
//! Builds a bounded summary of the session's recent turns so the model can
//! resolve follow-ups like "open the second one" or "louder".

use crate::session::store::SessionContext;

/// Character cap per turn line; commands can be pasted paragraphs
const MAX_TURN_CHARS: usize = 240;

/// Conversation context for LLM prompts
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// Maximum number of turns kept
    pub max_turns: usize,
    /// One line per recent turn, oldest first
    pub recent_turns: Vec<String>,
    /// Question the assistant is waiting on, if any
    pub pending_question: Option<String>,
}

impl PromptContext {
    /// Build from a session snapshot, keeping the last `max_turns` turns
    pub fn from_session(ctx: &SessionContext, max_turns: usize) -> Self {
        let mut prompt = Self {
            max_turns,
            recent_turns: Vec::new(),
            pending_question: ctx.pending.as_ref().map(|p| p.prompt.clone()),
        };
        for turn in &ctx.turns {
            prompt.add_turn(turn.summary());
        }
        prompt
    }

    /// Create an empty context for testing
    pub fn empty(max_turns: usize) -> Self {
        Self {
            max_turns,
            ..Self::default()
        }
    }

    /// Add a turn line, evicting the oldest past the cap
    pub fn add_turn(&mut self, line: impl Into<String>) {
        self.recent_turns.push(truncate(line.into(), MAX_TURN_CHARS));
        while self.recent_turns.len() > self.max_turns {
            self.recent_turns.remove(0);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.recent_turns.is_empty() && self.pending_question.is_none()
    }

    /// Generate a text summary of the context for LLM prompts
    pub fn summary(&self) -> String {
        let mut s = String::new();

        if self.recent_turns.is_empty() {
            s.push_str("Recent turns: none\n");
        } else {
            s.push_str("Recent turns (oldest first):\n");
            for line in &self.recent_turns {
                s.push_str(&format!("- {}\n", line));
            }
        }

        if let Some(question) = &self.pending_question {
            s.push_str(&format!("\nAwaiting answer to: {}\n", question));
        }

        s
    }
}

pub(crate) fn truncate(mut s: String, max_chars: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
        s.push('…');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SessionId;
    use crate::session::turn::{Outcome, Turn};
    use serde_json::json;

    #[test]
    fn test_empty_context() {
        let ctx = PromptContext::empty(5);
        assert!(ctx.is_empty());
        assert!(ctx.summary().contains("none"));
    }

    #[test]
    fn test_turn_limit() {
        let mut ctx = PromptContext::empty(5);
        for i in 0..10 {
            ctx.add_turn(format!("Turn {}", i));
        }

        // Should only keep last 5 turns
        assert_eq!(ctx.recent_turns.len(), 5);
        assert!(ctx.recent_turns.contains(&"Turn 9".to_string()));
        assert!(!ctx.recent_turns.contains(&"Turn 0".to_string()));
    }

    #[test]
    fn test_long_lines_are_truncated() {
        let mut ctx = PromptContext::empty(5);
        ctx.add_turn("é".repeat(500));
        assert_eq!(ctx.recent_turns[0].chars().count(), MAX_TURN_CHARS + 1);
    }

    #[test]
    fn test_from_session() {
        let mut session = SessionContext::empty(SessionId::from("s"));
        for cmd in ["open chrome", "play despacito", "scroll down"] {
            session
                .turns
                .push(Turn::new(cmd, None, Outcome::success(json!({}))));
        }

        let ctx = PromptContext::from_session(&session, 2);
        let summary = ctx.summary();
        assert!(!summary.contains("open chrome"));
        assert!(summary.contains("play despacito"));
        assert!(summary.contains("scroll down"));
        assert!(ctx.pending_question.is_none());
    }
}
