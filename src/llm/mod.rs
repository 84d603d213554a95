//! Language model side of intent resolution
//!
//! client -> prompt context -> reply parser -> catalog validation

pub mod client;
pub mod context;
pub mod parser;
pub mod resolver;

pub use client::{CompletionClient, LlmClient};
pub use context::PromptContext;
pub use parser::{parse_reply, LlmReply};
pub use resolver::{LlmIntentResolver, LlmResolution, ResolutionFailed};
