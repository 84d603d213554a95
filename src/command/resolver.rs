//! Intent resolution - turns a command into a dispatchable action
//!
//! Order of attempts:
//! 1. A pending clarification short-circuits everything: the command is the
//!    answer, merged into the earlier parameters and re-validated.
//! 2. The language model, once, bounded by its timeout.
//! 3. The rule-based fallback matcher.
//!
//! Whatever comes out is checked for references to earlier results
//! ("open 2" after a file search) before it is handed to the dispatcher.

use crate::actions::catalog::{Action, ActionCatalog, ActionSource, ParamType, Parameters};
use crate::command::fallback::{strip_fillers, FallbackMatcher, FallbackOutcome};
use crate::core::error::AssistError;
use crate::llm::resolver::{LlmIntentResolver, ResolutionFailed};
use crate::session::store::SessionContext;
use crate::session::turn::{Outcome, PendingClarification};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Question asked when nothing understood the command
pub const RESTATE_PROMPT: &str =
    "Sorry, I didn't understand that. Could you say it another way?";

/// Reply text when a pending question is cancelled
pub const CANCELLED_TEXT: &str = "Okay, cancelled.";

const CANCEL_PHRASES: &[&str] = &["cancel", "never mind", "nevermind", "forget it"];

/// What to do with a command
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Validated action, ready for the dispatcher
    Dispatch {
        action: Action,
        /// Model-written reply text, if any
        response: Option<String>,
    },
    /// Ask the user; `pending` is set when there is an action to merge the answer into
    Clarify {
        outcome: Outcome,
        pending: Option<PendingClarification>,
    },
    /// Finished without dispatch
    Done {
        action: Option<Action>,
        outcome: Outcome,
        response: Option<String>,
    },
}

/// Resolves commands into actions using session context
pub struct IntentResolver {
    catalog: Arc<ActionCatalog>,
    llm: LlmIntentResolver,
    fallback: FallbackMatcher,
}

impl IntentResolver {
    pub fn new(catalog: Arc<ActionCatalog>, llm: LlmIntentResolver, fallback: FallbackMatcher) -> Self {
        Self {
            catalog,
            llm,
            fallback,
        }
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn llm_configured(&self) -> bool {
        self.llm.is_configured()
    }

    /// Resolve a command against a session snapshot
    pub async fn resolve(&self, command: &str, context: &SessionContext) -> Resolution {
        let command = command.trim();

        let resolution = if let Some(pending) = &context.pending {
            self.answer(command, pending)
        } else if command.is_empty() {
            restate()
        } else {
            match self.llm.resolve(command, context).await {
                Ok(resolved) => {
                    debug!(
                        session = %context.session_id,
                        kind = %resolved.action.kind,
                        source = "llm",
                        "resolved command"
                    );
                    Resolution::Dispatch {
                        action: resolved.action,
                        response: resolved.response,
                    }
                }
                Err(ResolutionFailed::NotConfigured) => self.match_fallback(command),
                Err(e) => {
                    debug!(session = %context.session_id, error = %e, "falling back to rules");
                    self.match_fallback(command)
                }
            }
        };

        resolve_references(resolution, context)
    }

    fn match_fallback(&self, command: &str) -> Resolution {
        match self.fallback.match_command(command) {
            FallbackOutcome::Matched(action) => {
                debug!(kind = %action.kind, source = "fallback", "resolved command");
                Resolution::Dispatch {
                    action,
                    response: None,
                }
            }
            FallbackOutcome::Incomplete {
                kind,
                parameters,
                error,
            } => self.incomplete(
                kind,
                parameters,
                error,
                ActionSource::Fallback,
                self.fallback.confidence(),
            ),
            FallbackOutcome::NoMatch => restate(),
        }
    }

    /// Merge a clarification answer into the pending action
    fn answer(&self, command: &str, pending: &PendingClarification) -> Resolution {
        if is_cancel(command) {
            debug!(kind = %pending.kind, "clarification cancelled");
            return Resolution::Done {
                action: None,
                outcome: Outcome::success(json!({"cancelled": true})),
                response: Some(CANCELLED_TEXT.to_string()),
            };
        }

        let answer = strip_fillers(command);
        if answer.is_empty() {
            return Resolution::Clarify {
                outcome: Outcome::clarify(&pending.missing_parameter, &pending.prompt),
                pending: Some(pending.clone()),
            };
        }

        let ty = self
            .catalog
            .lookup(&pending.kind)
            .and_then(|spec| spec.get_param(&pending.missing_parameter))
            .map(|p| p.ty)
            .unwrap_or(ParamType::String);

        let mut parameters = pending.parameters.clone();
        parameters.insert(pending.missing_parameter.clone(), coerce_answer(ty, &answer));
        debug!(kind = %pending.kind, param = %pending.missing_parameter, "merging clarification answer");

        match self
            .catalog
            .validate(&pending.kind, &parameters, pending.source, pending.confidence)
        {
            Ok(action) => Resolution::Dispatch {
                action,
                response: None,
            },
            Err(error) => self.incomplete(
                pending.kind.clone(),
                parameters,
                error,
                pending.source,
                pending.confidence,
            ),
        }
    }

    /// A kind was identified but its parameters did not validate
    fn incomplete(
        &self,
        kind: String,
        parameters: Parameters,
        error: AssistError,
        source: ActionSource,
        confidence: f32,
    ) -> Resolution {
        match error {
            AssistError::MissingParameter(name) => {
                let prompt = self
                    .catalog
                    .lookup(&kind)
                    .and_then(|spec| spec.get_param(&name))
                    .map(|p| p.clarify_prompt())
                    .unwrap_or_else(|| format!("What {} should I use?", name));
                Resolution::Clarify {
                    outcome: Outcome::clarify(&name, &prompt),
                    pending: Some(PendingClarification {
                        kind,
                        missing_parameter: name,
                        parameters,
                        prompt,
                        source,
                        confidence,
                    }),
                }
            }
            AssistError::InvalidParameterType {
                name,
                expected,
                actual,
            } => Resolution::Done {
                action: None,
                outcome: Outcome::invalid_parameter(
                    &name,
                    format!("{} should be {}, not {}", name.replace('_', " "), expected, actual),
                ),
                response: None,
            },
            other if other.is_validation() => {
                debug!(kind = %kind, error = %other, "unusable candidate");
                restate()
            }
            other => {
                warn!(kind = %kind, error = %other, "resolution error");
                restate()
            }
        }
    }
}

fn restate() -> Resolution {
    Resolution::Clarify {
        outcome: Outcome::clarify("command", RESTATE_PROMPT),
        pending: None,
    }
}

fn is_cancel(command: &str) -> bool {
    let normalized = command
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '!'))
        .to_lowercase();
    CANCEL_PHRASES.contains(&normalized.as_str())
}

/// Interpret a free-text answer as the parameter's declared type
fn coerce_answer(ty: ParamType, answer: &str) -> Value {
    match ty {
        ParamType::String => Value::String(answer.to_string()),
        ParamType::Integer => answer
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(answer.to_string())),
        ParamType::Number => answer
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(answer.to_string())),
        ParamType::Boolean => match answer.to_lowercase().as_str() {
            "yes" | "y" | "true" | "sure" => Value::Bool(true),
            "no" | "n" | "false" => Value::Bool(false),
            _ => Value::String(answer.to_string()),
        },
        ParamType::StringList => Value::Array(
            answer
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
    }
}

/// Rewrite "open 2" into the path of the 2nd result of the latest file search
fn resolve_references(resolution: Resolution, context: &SessionContext) -> Resolution {
    let (mut action, response) = match resolution {
        Resolution::Dispatch { action, response } => (action, response),
        other => return other,
    };
    if action.kind != "open_file" {
        return Resolution::Dispatch { action, response };
    }

    let Some(index) = action
        .param_str("target")
        .and_then(|t| t.trim().trim_start_matches('#').parse::<usize>().ok())
    else {
        return Resolution::Dispatch { action, response };
    };

    let path = context
        .latest_success("search_files")
        .and_then(|payload| payload.get("results"))
        .and_then(Value::as_array)
        .and_then(|results| results.get(index.checked_sub(1)?))
        .and_then(|item| item.as_str().or_else(|| item.get("path").and_then(Value::as_str)))
        .map(str::to_string);

    match path {
        Some(path) => {
            debug!(index, path = %path, "resolved search result reference");
            action.parameters.insert("target".into(), Value::String(path));
            Resolution::Dispatch { action, response }
        }
        None => Resolution::Done {
            outcome: Outcome::invalid_parameter(
                "target",
                format!("there is no result {} from a recent file search", index),
            ),
            action: Some(action),
            response: None,
        },
    }
}
