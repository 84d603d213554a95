//! Reply composition
//!
//! Pure mapping from an outcome (plus the action that produced it) to the
//! text and data handed back to the transport layer.

use crate::actions::catalog::{Action, ActionCatalog};
use crate::session::turn::{FailureKind, Outcome};
use serde::Serialize;
use serde_json::Value;

/// Final reply for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub text: String,
    /// Structured payload from a successful action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Set when the assistant is waiting for an answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification: Option<String>,
    pub outcome: Outcome,
}

impl Reply {
    pub fn is_question(&self) -> bool {
        self.clarification.is_some()
    }
}

/// Build the reply for an outcome
///
/// `response` is reply text supplied by the resolver (the model's own
/// wording, or a fixed message such as a cancellation); it only replaces
/// the text of successful outcomes.
pub fn compose(
    outcome: &Outcome,
    action: Option<&Action>,
    catalog: &ActionCatalog,
    response: Option<&str>,
) -> Reply {
    match outcome {
        Outcome::Success { payload } => {
            let text = response
                .map(str::to_string)
                .or_else(|| {
                    let action = action?;
                    let spec = catalog.lookup(&action.kind)?;
                    Some(spec.render_confirmation(&action.parameters))
                })
                .unwrap_or_else(|| "Done.".to_string());
            Reply {
                text,
                data: (!payload.is_null()).then(|| payload.clone()),
                clarification: None,
                outcome: outcome.clone(),
            }
        }
        Outcome::Failure {
            kind: FailureKind::Transient,
            message,
            ..
        } => Reply {
            text: format!("Sorry, that didn't work ({}). Please try again.", message),
            data: None,
            clarification: None,
            outcome: outcome.clone(),
        },
        Outcome::Failure {
            kind: FailureKind::Semantic,
            message,
            parameter,
        } => {
            let text = match parameter {
                Some(name) => {
                    let value = action
                        .and_then(|a| a.parameters.get(name))
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        });
                    let label = name.replace('_', " ");
                    match value {
                        Some(value) => {
                            format!("I couldn't do that: {} (the {} was \"{}\").", message, label, value)
                        }
                        None => format!("I couldn't do that: {} (check the {}).", message, label),
                    }
                }
                None => format!("I couldn't do that: {}.", message),
            };
            Reply {
                text,
                data: None,
                clarification: None,
                outcome: outcome.clone(),
            }
        }
        Outcome::NeedsClarification { prompt, .. } => Reply {
            text: prompt.clone(),
            data: None,
            clarification: Some(prompt.clone()),
            outcome: outcome.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalog::ActionSource;
    use serde_json::json;

    fn action(kind: &str, params: Value) -> Action {
        ActionCatalog::builtin()
            .validate(kind, params.as_object().unwrap(), ActionSource::Fallback, 0.5)
            .unwrap()
    }

    #[test]
    fn test_success_uses_confirmation_template() {
        let catalog = ActionCatalog::builtin();
        let action = action("play_media", json!({"query": "despacito"}));
        let reply = compose(&Outcome::success(json!({"playing": true})), Some(&action), &catalog, None);
        assert_eq!(reply.text, "Playing despacito");
        assert_eq!(reply.data, Some(json!({"playing": true})));
        assert!(!reply.is_question());
    }

    #[test]
    fn test_success_prefers_resolver_text() {
        let catalog = ActionCatalog::builtin();
        let action = action("launch_app", json!({"name": "chrome"}));
        let reply = compose(
            &Outcome::success(Value::Null),
            Some(&action),
            &catalog,
            Some("Launching Chrome for you"),
        );
        assert_eq!(reply.text, "Launching Chrome for you");
        assert!(reply.data.is_none());
    }

    #[test]
    fn test_transient_failure_suggests_retry() {
        let catalog = ActionCatalog::builtin();
        let reply = compose(&Outcome::transient("cancelled"), None, &catalog, None);
        assert!(reply.text.starts_with("Sorry"));
        assert!(reply.text.contains("try again"));
    }

    #[test]
    fn test_semantic_failure_names_parameter() {
        let catalog = ActionCatalog::builtin();
        let action = action("launch_app", json!({"name": "chrome"}));
        let reply = compose(
            &Outcome::invalid_parameter("name", "app not found"),
            Some(&action),
            &catalog,
            Some("Opening Chrome"),
        );
        assert_eq!(
            reply.text,
            "I couldn't do that: app not found (the name was \"chrome\")."
        );

        let reply = compose(&Outcome::semantic("disk full"), None, &catalog, None);
        assert_eq!(reply.text, "I couldn't do that: disk full.");
    }

    #[test]
    fn test_clarification_is_a_question() {
        let catalog = ActionCatalog::builtin();
        let reply = compose(
            &Outcome::clarify("query", "What should I search for?"),
            None,
            &catalog,
            None,
        );
        assert_eq!(reply.text, "What should I search for?");
        assert!(reply.is_question());
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["outcome"]["status"], "needs_clarification");
        assert!(json.get("data").is_none());
    }
}
