//! End-to-end request handling
//!
//! One request is one logical task: snapshot the session, resolve and
//! dispatch without holding any session lock, compose the reply, then
//! record the turn (and any pending question) under the lock in one step.
//! Every request yields exactly one reply and one recorded turn.

use crate::actions::catalog::{Action, ActionCatalog};
use crate::command::dispatcher::Dispatcher;
use crate::command::fallback::FallbackMatcher;
use crate::command::resolver::{IntentResolver, Resolution};
use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::core::types::{Capability, SessionId};
use crate::llm::client::CompletionClient;
use crate::llm::resolver::LlmIntentResolver;
use crate::response::composer::{compose, Reply};
use crate::session::store::{SessionContext, SessionStore};
use crate::session::turn::{Outcome, PendingClarification, Turn};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Snapshot of engine health for front-ends
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub llm_configured: bool,
    pub active_sessions: usize,
    pub catalog_size: usize,
    pub capabilities: Vec<Capability>,
}

/// Result of resolve + dispatch before it is recorded
struct Processed {
    action: Option<Action>,
    outcome: Outcome,
    pending: Option<PendingClarification>,
    response: Option<String>,
}

/// Intent resolution and dispatch engine
pub struct AssistantEngine {
    config: EngineConfig,
    catalog: Arc<ActionCatalog>,
    resolver: IntentResolver,
    dispatcher: Dispatcher,
    sessions: SessionStore,
}

impl AssistantEngine {
    /// Wire the engine together; `client` is None when no model is configured
    pub fn new(
        config: EngineConfig,
        catalog: Arc<ActionCatalog>,
        client: Option<Arc<dyn CompletionClient>>,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        config.validate()?;

        let llm = LlmIntentResolver::new(client, catalog.clone(), &config);
        let fallback = FallbackMatcher::new(catalog.clone(), config.fallback_confidence);
        let resolver = IntentResolver::new(catalog.clone(), llm, fallback);
        let sessions = SessionStore::new(config.max_turns_per_session, config.session_idle());

        info!(
            kinds = catalog.len(),
            llm = resolver.llm_configured(),
            "assistant engine ready"
        );

        Ok(Self {
            config,
            catalog,
            resolver,
            dispatcher,
            sessions,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one command for a session
    pub async fn handle(&self, session: &SessionId, command: &str) -> Reply {
        self.handle_with_cancel(session, command, CancellationToken::new())
            .await
    }

    /// Handle one command, abandoning in-flight work if `cancel` fires or
    /// the request deadline elapses
    pub async fn handle_with_cancel(
        &self,
        session: &SessionId,
        command: &str,
        cancel: CancellationToken,
    ) -> Reply {
        self.sessions.sweep();
        let context = self.sessions.snapshot(session, self.config.context_turns);
        let deadline = self.config.request_deadline();

        let processed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(session = %session, "request cancelled");
                interrupted(&context, "cancelled")
            }
            result = tokio::time::timeout(deadline, self.process(command, &context)) => {
                match result {
                    Ok(processed) => processed,
                    Err(_) => {
                        info!(session = %session, ?deadline, "request deadline elapsed");
                        interrupted(&context, "request deadline elapsed")
                    }
                }
            }
        };

        let reply = compose(
            &processed.outcome,
            processed.action.as_ref(),
            &self.catalog,
            processed.response.as_deref(),
        );

        info!(
            session = %session,
            kind = processed.action.as_ref().map(|a| a.kind.as_str()).unwrap_or("-"),
            source = ?processed.action.as_ref().map(|a| a.source),
            status = outcome_label(&processed.outcome),
            "turn complete"
        );

        self.sessions.record(
            session,
            Turn::new(command, processed.action, processed.outcome),
            processed.pending,
        );
        reply
    }

    async fn process(&self, command: &str, context: &SessionContext) -> Processed {
        match self.resolver.resolve(command, context).await {
            Resolution::Dispatch { action, response } => {
                let outcome = self.dispatcher.dispatch(&action).await;
                Processed {
                    action: Some(action),
                    outcome,
                    pending: None,
                    response,
                }
            }
            Resolution::Clarify { outcome, pending } => {
                debug!(session = %context.session_id, pending = pending.is_some(), "asking for clarification");
                Processed {
                    action: None,
                    outcome,
                    pending,
                    response: None,
                }
            }
            Resolution::Done {
                action,
                outcome,
                response,
            } => Processed {
                action,
                outcome,
                pending: None,
                response,
            },
        }
    }

    /// Destroy a session and its history
    pub fn reset(&self, session: &SessionId) -> bool {
        let existed = self.sessions.reset(session);
        debug!(session = %session, existed, "session reset");
        existed
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            llm_configured: self.resolver.llm_configured(),
            active_sessions: self.sessions.len(),
            catalog_size: self.catalog.len(),
            capabilities: self.dispatcher.capabilities(),
        }
    }
}

/// Turn for abandoned work; an outstanding question stays outstanding
fn interrupted(context: &SessionContext, message: &str) -> Processed {
    Processed {
        action: None,
        outcome: Outcome::transient(message),
        pending: context.pending.clone(),
        response: None,
    }
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Success { .. } => "success",
        Outcome::Failure { .. } => "failure",
        Outcome::NeedsClarification { .. } => "needs_clarification",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::executor::DryRunExecutor;

    fn engine() -> AssistantEngine {
        let config = EngineConfig::default();
        let catalog = Arc::new(ActionCatalog::builtin());
        let mut builder = Dispatcher::builder(catalog.clone(), &config);
        for cap in Capability::ALL {
            builder = builder.register(cap, Arc::new(DryRunExecutor::new(cap)));
        }
        AssistantEngine::new(config, catalog, None, builder.build().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_every_request_records_one_turn() {
        let engine = engine();
        let id = SessionId::from("s");
        for command in ["play despacito", "banana", "", "find"] {
            let reply = engine.handle(&id, command).await;
            assert!(!reply.text.is_empty());
        }
        assert_eq!(engine.sessions().get_context(&id).len(), 4);
    }

    #[tokio::test]
    async fn test_status_and_reset() {
        let engine = engine();
        let id = SessionId::from("s");
        engine.handle(&id, "scroll down").await;

        let status = engine.status();
        assert!(!status.llm_configured);
        assert_eq!(status.active_sessions, 1);
        assert_eq!(status.catalog_size, 14);
        assert_eq!(status.capabilities.len(), 5);

        assert!(engine.reset(&id));
        assert_eq!(engine.status().active_sessions, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            context_turns: 0,
            ..EngineConfig::default()
        };
        let catalog = Arc::new(ActionCatalog::builtin());
        let mut builder = Dispatcher::builder(catalog.clone(), &config);
        for cap in Capability::ALL {
            builder = builder.register(cap, Arc::new(DryRunExecutor::new(cap)));
        }
        let dispatcher = builder.build().unwrap();
        assert!(AssistantEngine::new(config, catalog, None, dispatcher).is_err());
    }
}
