//! Session context store

pub mod store;
pub mod turn;

pub use store::{SessionContext, SessionStore};
pub use turn::{FailureKind, Outcome, PendingClarification, Turn};
