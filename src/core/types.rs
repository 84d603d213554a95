//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a conversation session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Category of external effect an action produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Media,
    Filesystem,
    Vision,
    Input,
    System,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Media,
        Capability::Filesystem,
        Capability::Vision,
        Capability::Input,
        Capability::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Media => "media",
            Capability::Filesystem => "filesystem",
            Capability::Vision => "vision",
            Capability::Input => "input",
            Capability::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "media" => Some(Capability::Media),
            "filesystem" => Some(Capability::Filesystem),
            "vision" => Some(Capability::Vision),
            "input" => Some(Capability::Input),
            "system" => Some(Capability::System),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
