pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{AssistError, Result};
pub use types::{Capability, SessionId};
