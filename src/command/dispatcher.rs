//! Action dispatch with timeout and bounded retry
//!
//! Each call runs a small state machine:
//!
//! ```text
//! Pending -> Executing -> Succeeded
//!               |  ^
//!               v  | (transient, retry budget left, idempotent)
//!         Failed / TimedOut
//! ```
//!
//! Semantic failures end the call immediately. Transient failures and
//! timeouts are retried with the same action, but only when both the
//! catalog and the executor say the action is idempotent.

use crate::actions::catalog::{Action, ActionCatalog};
use crate::command::executor::Executor;
use crate::core::config::{CapabilityTimeouts, EngineConfig};
use crate::core::error::{AssistError, Result};
use crate::core::types::Capability;
use crate::session::turn::Outcome;
use ahash::AHashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a dispatch call ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    Executing,
    Succeeded,
    Failed,
    TimedOut,
}

/// Outcome of a dispatch plus bookkeeping for logs and tests
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub outcome: Outcome,
    pub attempts: u32,
    /// Final state
    pub state: DispatchState,
    /// Every state the call passed through, starting with `Pending`
    pub transitions: Vec<DispatchState>,
}

/// Routes validated actions to the executor registered for their capability
pub struct Dispatcher {
    catalog: Arc<ActionCatalog>,
    executors: AHashMap<Capability, Arc<dyn Executor>>,
    timeouts: CapabilityTimeouts,
    max_retries: u32,
    backoff: Duration,
}

/// Collects executors before the dispatcher is frozen
pub struct DispatcherBuilder {
    catalog: Arc<ActionCatalog>,
    executors: AHashMap<Capability, Arc<dyn Executor>>,
    timeouts: CapabilityTimeouts,
    max_retries: u32,
    backoff: Duration,
}

impl DispatcherBuilder {
    /// Register the executor for a capability, replacing any earlier one
    pub fn register(mut self, capability: Capability, executor: Arc<dyn Executor>) -> Self {
        self.executors.insert(capability, executor);
        self
    }

    /// Every capability used by the catalog must have an executor
    pub fn build(self) -> Result<Dispatcher> {
        let mut missing: Vec<&str> = Vec::new();
        for spec in self.catalog.specs() {
            let name = spec.capability.as_str();
            if !self.executors.contains_key(&spec.capability) && !missing.contains(&name) {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(AssistError::Config(format!(
                "no executor registered for capability: {}",
                missing.join(", ")
            )));
        }

        Ok(Dispatcher {
            catalog: self.catalog,
            executors: self.executors,
            timeouts: self.timeouts,
            max_retries: self.max_retries,
            backoff: self.backoff,
        })
    }
}

impl Dispatcher {
    pub fn builder(catalog: Arc<ActionCatalog>, config: &EngineConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            catalog,
            executors: AHashMap::new(),
            timeouts: config.timeouts.clone(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Capabilities with a registered executor
    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.executors.contains_key(c))
            .collect()
    }

    pub async fn dispatch(&self, action: &Action) -> Outcome {
        self.run(action).await.outcome
    }

    /// Dispatch and report how many attempts it took
    pub async fn run(&self, action: &Action) -> DispatchReport {
        let mut transitions = vec![DispatchState::Pending];
        debug!(kind = %action.kind, "dispatching");

        let Some(executor) = self.executors.get(&action.capability) else {
            // build() rejects catalogs with unserved capabilities
            transitions.push(DispatchState::Failed);
            return DispatchReport {
                outcome: Outcome::semantic(format!(
                    "no executor for capability {}",
                    action.capability
                )),
                attempts: 0,
                state: DispatchState::Failed,
                transitions,
            };
        };

        let spec = self.catalog.lookup(&action.kind);
        let retryable = spec.map(|s| s.idempotent).unwrap_or(false) && executor.is_idempotent(action);
        let max_attempts = if retryable { 1 + self.max_retries } else { 1 };
        let budget = self.timeouts.for_capability(action.capability);

        let mut attempts = 0;
        let mut last_error = String::new();

        while attempts < max_attempts {
            attempts += 1;
            transitions.push(DispatchState::Executing);

            match tokio::time::timeout(budget, executor.execute(action)).await {
                Ok(Ok(payload)) => {
                    info!(
                        kind = %action.kind,
                        capability = %action.capability,
                        attempt = attempts,
                        "action succeeded"
                    );
                    transitions.push(DispatchState::Succeeded);
                    return DispatchReport {
                        outcome: Outcome::success(payload),
                        attempts,
                        state: DispatchState::Succeeded,
                        transitions,
                    };
                }
                Ok(Err(e)) if !e.is_transient() => {
                    info!(kind = %action.kind, error = %e, "action failed");
                    // Name the parameter the user supplied, if the kind has one
                    let outcome = match spec.and_then(|s| s.primary_param()) {
                        Some(param) => Outcome::invalid_parameter(param.name.clone(), e.message),
                        None => Outcome::semantic(e.message),
                    };
                    transitions.push(DispatchState::Failed);
                    return DispatchReport {
                        outcome,
                        attempts,
                        state: DispatchState::Failed,
                        transitions,
                    };
                }
                Ok(Err(e)) => {
                    transitions.push(DispatchState::Failed);
                    last_error = e.message;
                }
                Err(_) => {
                    transitions.push(DispatchState::TimedOut);
                    last_error = format!("{} timed out after {:?}", action.capability, budget);
                }
            }

            if attempts < max_attempts {
                let delay = jittered(self.backoff, attempts);
                warn!(
                    kind = %action.kind,
                    attempt = attempts,
                    error = %last_error,
                    ?delay,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            } else if !retryable {
                debug!(kind = %action.kind, "not retrying non-idempotent action");
            }
        }

        let state = transitions.last().copied().unwrap_or(DispatchState::Failed);
        warn!(kind = %action.kind, attempts, ?state, error = %last_error, "action failed");
        DispatchReport {
            outcome: Outcome::transient(last_error),
            attempts,
            state,
            transitions,
        }
    }
}

/// Linear backoff with up to one extra base interval of jitter
fn jittered(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let jitter = if base_ms > 0 {
        rand::thread_rng().gen_range(0..=base_ms)
    } else {
        0
    };
    Duration::from_millis(base_ms * attempt as u64 + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalog::ActionSource;
    use crate::command::executor::{DryRunExecutor, ExecutorError};
    use crate::session::turn::FailureKind;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails transiently `failures` times, then succeeds
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl Executor for Flaky {
        async fn execute(&self, _action: &Action) -> std::result::Result<Value, ExecutorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ExecutorError::transient("network unreachable"))
            } else {
                Ok(json!({"ok": true}))
            }
        }
    }

    struct NotFound {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Executor for NotFound {
        async fn execute(&self, _action: &Action) -> std::result::Result<Value, ExecutorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ExecutorError::semantic("app not found"))
        }
    }

    struct Hangs;

    #[async_trait]
    impl Executor for Hangs {
        async fn execute(&self, _action: &Action) -> std::result::Result<Value, ExecutorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    fn catalog() -> Arc<ActionCatalog> {
        Arc::new(ActionCatalog::builtin())
    }

    fn action(kind: &str, params: Value) -> Action {
        catalog()
            .validate(kind, params.as_object().unwrap(), ActionSource::Llm, 0.9)
            .unwrap()
    }

    fn dispatcher_with(capability: Capability, executor: Arc<dyn Executor>) -> Dispatcher {
        let mut builder = Dispatcher::builder(catalog(), &EngineConfig::default());
        for cap in Capability::ALL {
            builder = builder.register(cap, Arc::new(DryRunExecutor::new(cap)));
        }
        builder.register(capability, executor).build().unwrap()
    }

    #[test]
    fn test_build_requires_every_capability() {
        let result = Dispatcher::builder(catalog(), &EngineConfig::default())
            .register(Capability::Media, Arc::new(DryRunExecutor::new(Capability::Media)))
            .build();
        match result {
            Err(AssistError::Config(msg)) => {
                assert!(msg.contains("filesystem"));
                assert!(!msg.contains("media"));
            }
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let d = dispatcher_with(Capability::Media, Arc::new(DryRunExecutor::new(Capability::Media)));
        let report = d.run(&action("play_media", json!({"query": "despacito"}))).await;
        assert!(report.outcome.is_success());
        assert_eq!(report.attempts, 1);
        assert_eq!(report.state, DispatchState::Succeeded);
        assert_eq!(
            d.capabilities(),
            Capability::ALL.to_vec()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            failures: 2,
        });
        let d = dispatcher_with(Capability::Media, flaky.clone());
        let report = d.run(&action("play_media", json!({"query": "jazz"}))).await;
        assert!(report.outcome.is_success());
        assert_eq!(report.attempts, 3);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            report.transitions,
            vec![
                DispatchState::Pending,
                DispatchState::Executing,
                DispatchState::Failed,
                DispatchState::Executing,
                DispatchState::Failed,
                DispatchState::Executing,
                DispatchState::Succeeded,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
        });
        let d = dispatcher_with(Capability::Media, flaky.clone());
        let report = d.run(&action("play_media", json!({"query": "jazz"}))).await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.state, DispatchState::Failed);
        match report.outcome {
            Outcome::Failure { kind, message, .. } => {
                assert_eq!(kind, FailureKind::Transient);
                assert_eq!(message, "network unreachable");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_idempotent_action_runs_once() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
        });
        let d = dispatcher_with(Capability::Input, flaky.clone());
        let report = d.run(&action("click_screen", json!({"target": "OK"}))).await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.attempts, 1);
        assert!(matches!(
            report.outcome,
            Outcome::Failure { kind: FailureKind::Transient, .. }
        ));
    }

    #[tokio::test]
    async fn test_semantic_failure_is_not_retried() {
        let executor = Arc::new(NotFound {
            calls: AtomicU32::new(0),
        });
        let d = dispatcher_with(Capability::System, executor.clone());
        let report = d.run(&action("launch_app", json!({"name": "chrome"}))).await;
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        match report.outcome {
            Outcome::Failure {
                kind,
                message,
                parameter,
            } => {
                assert_eq!(kind, FailureKind::Semantic);
                assert_eq!(message, "app not found");
                assert_eq!(parameter.as_deref(), Some("name"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_uses_capability_budget() {
        let d = dispatcher_with(Capability::Input, Arc::new(Hangs));
        let start = tokio::time::Instant::now();
        let report = d.run(&action("press_key", json!({"key": "enter"}))).await;
        assert_eq!(report.state, DispatchState::TimedOut);
        assert_eq!(report.attempts, 1);
        assert_eq!(
            report.transitions,
            vec![DispatchState::Pending, DispatchState::Executing, DispatchState::TimedOut]
        );
        // input budget is 2s and press_key is never retried
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
        match report.outcome {
            Outcome::Failure { kind, message, .. } => {
                assert_eq!(kind, FailureKind::Transient);
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(200);
        for attempt in 1..=2 {
            let d = jittered(base, attempt);
            assert!(d >= base * attempt);
            assert!(d <= base * (attempt + 1));
        }
        assert_eq!(jittered(Duration::ZERO, 1), Duration::ZERO);
    }
}
