//! Jarvis Core - intent resolution and action dispatch for a personal assistant

pub mod actions;
pub mod command;
pub mod core;
pub mod engine;
pub mod llm;
pub mod response;
pub mod session;

pub use engine::{AssistantEngine, EngineStatus};
