//! Command processing
//!
//! Resolves commands into validated actions (model first, rules second) and
//! dispatches them to capability executors.

pub mod dispatcher;
pub mod executor;
pub mod fallback;
pub mod resolver;

pub use dispatcher::{DispatchReport, DispatchState, Dispatcher, DispatcherBuilder};
pub use executor::{DryRunExecutor, Executor, ExecutorError};
pub use fallback::{FallbackMatcher, FallbackOutcome, FallbackRule};
pub use resolver::{IntentResolver, Resolution};
