//! Capability executors - the boundary to the outside world
//!
//! The engine never performs side effects itself. Each capability (media,
//! filesystem, vision, input, system) is served by one `Executor` registered
//! with the dispatcher at startup.

use crate::actions::catalog::Action;
use crate::core::types::Capability;
use crate::session::turn::FailureKind;
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

/// Failure reported by an executor
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ExecutorError {
    pub kind: FailureKind,
    pub message: String,
}

impl ExecutorError {
    /// Might succeed on another attempt (network blip, busy device)
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    /// Will fail the same way every time (file not found, app not installed)
    pub fn semantic(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Semantic,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// Performs validated actions for one capability
#[async_trait]
pub trait Executor: Send + Sync {
    /// Perform the action and return a result payload
    async fn execute(&self, action: &Action) -> Result<Value, ExecutorError>;

    /// Whether executing the action twice is the same as executing it once.
    /// The dispatcher only retries when both this and the catalog agree.
    fn is_idempotent(&self, _action: &Action) -> bool {
        true
    }
}

/// Executor that performs nothing and describes what it would have done
#[derive(Debug, Clone, Copy)]
pub struct DryRunExecutor {
    capability: Capability,
}

impl DryRunExecutor {
    pub fn new(capability: Capability) -> Self {
        Self { capability }
    }
}

#[async_trait]
impl Executor for DryRunExecutor {
    async fn execute(&self, action: &Action) -> Result<Value, ExecutorError> {
        if action.capability != self.capability {
            return Err(ExecutorError::semantic(format!(
                "{} executor cannot perform {}",
                self.capability, action.kind
            )));
        }

        let parameters = Value::Object(action.parameters.clone());
        info!(
            capability = %self.capability,
            kind = %action.kind,
            parameters = %parameters,
            "dry run"
        );

        let mut payload = json!({
            "dry_run": true,
            "kind": action.kind,
            "parameters": action.parameters,
        });
        // Searches report an empty result list so follow-ups resolve cleanly
        if action.kind == "search_files" || action.kind == "search_media" {
            payload["results"] = json!([]);
        }
        Ok(payload)
    }
}
