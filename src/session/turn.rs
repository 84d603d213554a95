//! Turn records and dispatch outcomes

use crate::actions::catalog::{Action, ActionSource, Parameters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Might succeed if tried again (timeout, network, cancelled)
    Transient,
    /// Intrinsic to the request (not found, invalid parameter)
    Semantic,
}

/// Result of one resolve-and-dispatch cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        payload: Value,
    },
    Failure {
        kind: FailureKind,
        message: String,
        /// Offending parameter, for validation failures
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameter: Option<String>,
    },
    NeedsClarification {
        missing_parameter: String,
        prompt: String,
    },
}

impl Outcome {
    pub fn success(payload: Value) -> Self {
        Outcome::Success { payload }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind: FailureKind::Transient,
            message: message.into(),
            parameter: None,
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind: FailureKind::Semantic,
            message: message.into(),
            parameter: None,
        }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind: FailureKind::Semantic,
            message: message.into(),
            parameter: Some(parameter.into()),
        }
    }

    pub fn clarify(missing_parameter: impl Into<String>, prompt: impl Into<String>) -> Self {
        Outcome::NeedsClarification {
            missing_parameter: missing_parameter.into(),
            prompt: prompt.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// One command and what came of it; never mutated after recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub command: String,
    /// None when resolution failed entirely
    pub action: Option<Action>,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(command: impl Into<String>, action: Option<Action>, outcome: Outcome) -> Self {
        Self {
            command: command.into(),
            action,
            outcome,
            timestamp: Utc::now(),
        }
    }

    /// Short line for prompt context
    pub fn summary(&self) -> String {
        let action = self
            .action
            .as_ref()
            .map(|a| format!("{} {}", a.kind, Value::Object(a.parameters.clone())))
            .unwrap_or_else(|| "unresolved".to_string());
        let outcome = match &self.outcome {
            Outcome::Success { .. } => "ok".to_string(),
            Outcome::Failure { kind, message, .. } => format!("{:?} failure: {}", kind, message),
            Outcome::NeedsClarification { prompt, .. } => format!("asked: {}", prompt),
        };
        format!("\"{}\" -> {} ({})", self.command, action, outcome)
    }
}

/// An outstanding question; the next command answers it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingClarification {
    pub kind: String,
    pub missing_parameter: String,
    /// Parameters gathered so far, merged with the answer
    pub parameters: Parameters,
    pub prompt: String,
    /// Carried over to the merged action
    pub source: ActionSource,
    pub confidence: f32,
}
