//! LLM-backed intent resolution
//!
//! One remote call per command, bounded by a hard timeout and never retried.
//! Every failure mode (no client, timeout, transport error, unparseable
//! reply, schema violation) comes back as `ResolutionFailed` so the caller
//! can fall through to the rule-based matcher.

use crate::actions::catalog::{Action, ActionCatalog, ActionSource};
use crate::core::config::EngineConfig;
use crate::core::error::AssistError;
use crate::llm::client::CompletionClient;
use crate::llm::context::PromptContext;
use crate::llm::parser::{build_system_prompt, build_user_prompt, parse_reply};
use crate::session::store::SessionContext;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Why the model could not produce a valid action
#[derive(Error, Debug)]
pub enum ResolutionFailed {
    #[error("no language model configured")]
    NotConfigured,

    #[error("language model timed out after {0:?}")]
    Timeout(Duration),

    #[error("language model call failed: {0}")]
    Remote(String),

    #[error("unparseable reply: {0}")]
    Malformed(String),

    #[error("reply failed validation: {0}")]
    Invalid(AssistError),
}

/// A validated action plus the model's message for the user
#[derive(Debug, Clone)]
pub struct LlmResolution {
    pub action: Action,
    pub response: Option<String>,
}

/// Resolves commands through a remote language model
pub struct LlmIntentResolver {
    client: Option<Arc<dyn CompletionClient>>,
    catalog: Arc<ActionCatalog>,
    system_prompt: String,
    timeout: Duration,
    context_turns: usize,
    default_confidence: f32,
    min_confidence: f32,
}

impl LlmIntentResolver {
    pub fn new(
        client: Option<Arc<dyn CompletionClient>>,
        catalog: Arc<ActionCatalog>,
        config: &EngineConfig,
    ) -> Self {
        // The catalog is frozen at startup, so the prompt is too
        let system_prompt = build_system_prompt(&catalog);
        Self {
            client,
            catalog,
            system_prompt,
            timeout: config.llm_timeout(),
            context_turns: config.context_turns,
            default_confidence: config.default_llm_confidence,
            min_confidence: config.min_llm_confidence,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Resolve a command; never panics or propagates past this boundary
    pub async fn resolve(
        &self,
        command: &str,
        context: &SessionContext,
    ) -> Result<LlmResolution, ResolutionFailed> {
        let client = self.client.as_ref().ok_or(ResolutionFailed::NotConfigured)?;

        let prompt_context = PromptContext::from_session(context, self.context_turns);
        let user_prompt = build_user_prompt(command, &prompt_context);

        let raw = match tokio::time::timeout(
            self.timeout,
            client.complete(&self.system_prompt, &user_prompt),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(session = %context.session_id, error = %e, "LLM call failed");
                return Err(ResolutionFailed::Remote(e.to_string()));
            }
            Err(_) => {
                warn!(session = %context.session_id, timeout = ?self.timeout, "LLM call timed out");
                return Err(ResolutionFailed::Timeout(self.timeout));
            }
        };

        let reply = parse_reply(&raw).map_err(|e| {
            debug!(error = %e, "discarding malformed LLM reply");
            ResolutionFailed::Malformed(e.to_string())
        })?;
        if let Some(reasoning) = &reply.reasoning {
            debug!(kind = %reply.action, reasoning = %reasoning, "LLM reasoning");
        }

        let confidence = reply
            .confidence
            .unwrap_or(self.default_confidence)
            .clamp(self.min_confidence, 1.0);

        let action = self
            .catalog
            .validate(&reply.action, &reply.parameters, ActionSource::Llm, confidence)
            .map_err(|e| {
                debug!(kind = %reply.action, error = %e, "LLM action failed validation");
                ResolutionFailed::Invalid(e)
            })?;

        Ok(LlmResolution {
            action,
            response: reply.response.filter(|r| !r.trim().is_empty()),
        })
    }
}
