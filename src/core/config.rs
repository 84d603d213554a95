//! Engine configuration with documented defaults
//!
//! All tunables are collected here. The config is read once at startup
//! (TOML file, then environment overrides) and never consulted again
//! mid-session.

use crate::core::error::{AssistError, Result};
use crate::core::types::Capability;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the intent resolution and dispatch engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === CONTEXT ===
    /// How many recent turns are rendered into the LLM prompt
    ///
    /// Bounds prompt size and cost. Older turns stay in the session but
    /// are not shown to the model.
    pub context_turns: usize,

    /// Maximum turns retained per session (oldest evicted first)
    pub max_turns_per_session: usize,

    /// Sessions untouched for longer than this are purged
    pub session_idle_secs: u64,

    // === TIMEOUTS ===
    /// Hard timeout for the single LLM resolution call
    pub llm_timeout_ms: u64,

    /// Overall budget for one request, resolution plus dispatch
    pub request_deadline_ms: u64,

    /// Per-capability executor budgets
    pub timeouts: CapabilityTimeouts,

    // === RETRY ===
    /// Retries after the first attempt, transient failures only
    pub max_retries: u32,

    /// Base delay between retries; jittered up to 2x
    pub retry_backoff_ms: u64,

    // === CONFIDENCE ===
    /// Fixed confidence for fallback-sourced actions
    pub fallback_confidence: f32,

    /// Confidence used when the LLM reply omits one
    pub default_llm_confidence: f32,

    /// Floor for LLM-sourced confidence; must exceed `fallback_confidence`
    pub min_llm_confidence: f32,

    // === SOURCES ===
    /// Optional TOML file with extra catalog entries
    pub catalog_path: Option<PathBuf>,

    /// Remote language model settings
    pub llm: LlmSettings,
}

/// Executor timeout budget per capability tag, in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapabilityTimeouts {
    pub media_ms: u64,
    pub filesystem_ms: u64,
    pub vision_ms: u64,
    pub input_ms: u64,
    pub system_ms: u64,
}

impl Default for CapabilityTimeouts {
    fn default() -> Self {
        Self {
            media_ms: 10_000,
            filesystem_ms: 15_000,
            // Screenshot upload plus a vision model round trip
            vision_ms: 20_000,
            // A keypress either happens immediately or not at all
            input_ms: 2_000,
            system_ms: 10_000,
        }
    }
}

impl CapabilityTimeouts {
    pub fn for_capability(&self, capability: Capability) -> Duration {
        let ms = match capability {
            Capability::Media => self.media_ms,
            Capability::Filesystem => self.filesystem_ms,
            Capability::Vision => self.vision_ms,
            Capability::Input => self.input_ms,
            Capability::System => self.system_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Remote language model connection settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
}

impl LlmSettings {
    /// A key shorter than this is treated as a placeholder
    const MIN_KEY_LEN: usize = 10;

    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| k.len() > Self::MIN_KEY_LEN && k != "YOUR_API_KEY_HERE")
            .unwrap_or(false)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_turns: 5,
            max_turns_per_session: 50,
            session_idle_secs: 30 * 60,

            llm_timeout_ms: 8_000,
            request_deadline_ms: 30_000,
            timeouts: CapabilityTimeouts::default(),

            max_retries: 2,
            retry_backoff_ms: 200,

            fallback_confidence: 0.5,
            default_llm_confidence: 0.9,
            min_llm_confidence: 0.6,

            catalog_path: None,
            llm: LlmSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override selected fields from the process environment
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("LLM_API_URL") {
            self.llm.api_url = Some(url);
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(n) = env_parse::<usize>("JARVIS_CONTEXT_TURNS") {
            self.context_turns = n;
        }
        if let Some(ms) = env_parse::<u64>("JARVIS_LLM_TIMEOUT_MS") {
            self.llm_timeout_ms = ms;
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.context_turns == 0 {
            return Err(AssistError::Config("context_turns must be at least 1".into()));
        }
        if self.max_turns_per_session == 0 {
            return Err(AssistError::Config(
                "max_turns_per_session must be at least 1".into(),
            ));
        }
        if self.llm_timeout_ms == 0 || self.request_deadline_ms == 0 {
            return Err(AssistError::Config("timeouts must be positive".into()));
        }
        for cap in Capability::ALL {
            if self.timeouts.for_capability(cap).is_zero() {
                return Err(AssistError::Config(format!(
                    "timeout for capability {} must be positive",
                    cap
                )));
            }
        }

        for (name, value) in [
            ("fallback_confidence", self.fallback_confidence),
            ("default_llm_confidence", self.default_llm_confidence),
            ("min_llm_confidence", self.min_llm_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AssistError::Config(format!(
                    "{} ({}) must be within 0.0..=1.0",
                    name, value
                )));
            }
        }

        // Fallback matches must always rank below model output
        if self.fallback_confidence >= self.min_llm_confidence {
            return Err(AssistError::Config(format!(
                "fallback_confidence ({}) should be < min_llm_confidence ({})",
                self.fallback_confidence, self.min_llm_confidence
            )));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
