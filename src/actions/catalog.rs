//! Action definitions and catalog
//!
//! The catalog is the closed set of action kinds the assistant can perform.
//! Both resolvers produce raw `(kind, parameters)` candidates; only
//! `ActionCatalog::validate` turns a candidate into an `Action`, so nothing
//! reaches the dispatcher unless every required parameter is present and
//! type-correct.

use crate::core::error::{AssistError, Result};
use crate::core::types::Capability;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Parameter mapping carried by candidates and actions
pub type Parameters = serde_json::Map<String, Value>;

/// Declared type of an action parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    StringList,
}

impl ParamType {
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::StringList => "string_list",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" => Some(ParamType::String),
            "integer" | "int" => Some(ParamType::Integer),
            "number" | "float" => Some(ParamType::Number),
            "boolean" | "bool" => Some(ParamType::Boolean),
            "string_list" | "list" => Some(ParamType::StringList),
            _ => None,
        }
    }

    /// Strict type check; no coercion between strings and numbers
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringList => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        }
    }
}

/// Human-readable JSON type of a value, for validation errors
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Null and blank strings count as absent
fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Schema for a single action parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    /// Question asked when the parameter is missing
    pub prompt: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            prompt: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            prompt: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn clarify_prompt(&self) -> String {
        self.prompt
            .clone()
            .unwrap_or_else(|| format!("What {} should I use?", self.name.replace('_', " ")))
    }
}

/// Catalog entry describing a supported action kind
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub kind: String,
    pub capability: Capability,
    pub params: Vec<ParamSpec>,
    /// False when executing twice differs from executing once (clicks, keypresses)
    pub idempotent: bool,
    pub aliases: Vec<String>,
    pub description: String,
    /// Success text template, `{param}` placeholders are filled from the action
    pub confirmation: String,
}

impl ActionSpec {
    pub fn new(kind: impl Into<String>, capability: Capability) -> Self {
        let kind = kind.into();
        Self {
            confirmation: format!("Done: {}", kind.replace('_', " ")),
            kind,
            capability,
            params: Vec::new(),
            idempotent: true,
            aliases: Vec::new(),
            description: String::new(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn confirm(mut self, template: impl Into<String>) -> Self {
        self.confirmation = template.into();
        self
    }

    pub fn get_param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// First required parameter, used when a candidate arrives empty-handed
    pub fn primary_param(&self) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.required)
    }

    /// Fill the confirmation template from the action's parameters
    pub fn render_confirmation(&self, parameters: &Parameters) -> String {
        let mut text = self.confirmation.clone();
        for (name, value) in parameters {
            let placeholder = format!("{{{}}}", name);
            if text.contains(&placeholder) {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                text = text.replace(&placeholder, &rendered);
            }
        }
        text
    }

    /// One-line schema summary used in LLM prompts
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                format!(
                    "{}{}: {}",
                    p.name,
                    if p.required { "" } else { "?" },
                    p.ty.name()
                )
            })
            .collect();
        format!("{}({})", self.kind, params.join(", "))
    }
}

/// Where a resolved action came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSource {
    Llm,
    Fallback,
}

/// A validated action, ready for dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: String,
    pub capability: Capability,
    pub parameters: Parameters,
    /// Resolver's confidence in the interpretation (0.0 - 1.0)
    pub confidence: f32,
    pub source: ActionSource,
}

impl Action {
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    pub fn param_i64(&self, name: &str) -> Option<i64> {
        self.parameters.get(name).and_then(Value::as_i64)
    }
}

/// Lookup key for kinds and aliases: case-folded, separators unified
fn normalize_kind(kind: &str) -> String {
    kind.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Registry of supported action kinds, read-only once built
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    specs: Vec<ActionSpec>,
    index: AHashMap<String, usize>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec; kinds and aliases must be unique across the catalog
    pub fn register(&mut self, spec: ActionSpec) -> Result<()> {
        let idx = self.specs.len();
        let mut keys = vec![normalize_kind(&spec.kind)];
        keys.extend(spec.aliases.iter().map(|a| normalize_kind(a)));

        for key in &keys {
            if key.is_empty() {
                return Err(AssistError::Catalog(format!(
                    "empty kind or alias on {:?}",
                    spec.kind
                )));
            }
            if self.index.contains_key(key) {
                return Err(AssistError::Catalog(format!(
                    "duplicate action kind or alias: {}",
                    key
                )));
            }
        }
        for key in keys {
            self.index.insert(key, idx);
        }
        self.specs.push(spec);
        Ok(())
    }

    /// Look up a spec by kind or alias (case-insensitive)
    pub fn lookup(&self, kind: &str) -> Option<&ActionSpec> {
        self.index
            .get(&normalize_kind(kind))
            .map(|&idx| &self.specs[idx])
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.lookup(kind).is_some()
    }

    /// Specs in registration order
    pub fn specs(&self) -> impl Iterator<Item = &ActionSpec> {
        self.specs.iter()
    }

    /// Registration position of a kind, used to break rule ties
    pub fn position(&self, kind: &str) -> Option<usize> {
        self.index.get(&normalize_kind(kind)).copied()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Validate raw parameters against a kind's schema
    ///
    /// Returns the cleaned parameter map: provided values unchanged, defaults
    /// filled in for absent optional parameters, unknown names dropped.
    pub fn validate_parameters(&self, kind: &str, raw: &Parameters) -> Result<Parameters> {
        let spec = self
            .lookup(kind)
            .ok_or_else(|| AssistError::UnknownAction(kind.to_string()))?;

        let mut cleaned = Parameters::new();
        for param in &spec.params {
            let value = raw.get(&param.name);
            if is_absent(value) {
                if param.required {
                    return Err(AssistError::MissingParameter(param.name.clone()));
                }
                if let Some(default) = &param.default {
                    cleaned.insert(param.name.clone(), default.clone());
                }
                continue;
            }

            // is_absent(None) is true, so the value exists here
            let Some(value) = value else { continue };
            if !param.ty.matches(value) {
                return Err(AssistError::InvalidParameterType {
                    name: param.name.clone(),
                    expected: param.ty.name().to_string(),
                    actual: json_type_name(value).to_string(),
                });
            }
            cleaned.insert(param.name.clone(), value.clone());
        }

        for name in raw.keys() {
            if spec.get_param(name).is_none() {
                debug!(kind = %spec.kind, param = %name, "dropping unknown parameter");
            }
        }

        Ok(cleaned)
    }

    /// Validate a candidate into an `Action`
    pub fn validate(
        &self,
        kind: &str,
        raw: &Parameters,
        source: ActionSource,
        confidence: f32,
    ) -> Result<Action> {
        let parameters = self.validate_parameters(kind, raw)?;
        // lookup cannot fail after validate_parameters succeeded
        let spec = self
            .lookup(kind)
            .ok_or_else(|| AssistError::UnknownAction(kind.to_string()))?;

        Ok(Action {
            kind: spec.kind.clone(),
            capability: spec.capability,
            parameters,
            confidence: confidence.clamp(0.0, 1.0),
            source,
        })
    }

    /// The catalog shipped with the assistant
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for spec in builtin_specs() {
            // builtin kinds are unique
            if let Err(e) = catalog.register(spec) {
                debug!(error = %e, "skipping builtin spec");
            }
        }
        catalog
    }
}

/// Registration order matters: fallback rules break ties by it
fn builtin_specs() -> Vec<ActionSpec> {
    use ParamType::*;

    vec![
        // === MEDIA ===
        ActionSpec::new("play_media", Capability::Media)
            .param(ParamSpec::required("query", String).with_prompt("What should I play?"))
            .alias("play_youtube")
            .describe("Play a song or video directly")
            .confirm("Playing {query}"),
        ActionSpec::new("search_media", Capability::Media)
            .param(ParamSpec::required("query", String).with_prompt("What videos should I look for?"))
            .alias("search_youtube")
            .describe("Search for videos without playing")
            .confirm("Here are videos for {query}"),
        // === FILESYSTEM ===
        ActionSpec::new("search_files", Capability::Filesystem)
            .param(ParamSpec::required("query", String).with_prompt("What should I search for?"))
            .param(ParamSpec::optional("file_type", String))
            .param(ParamSpec::optional("max_results", Integer).with_default(50))
            .describe("Search files and folders in the user's directories")
            .confirm("Searched for {query}"),
        ActionSpec::new("open_file", Capability::Filesystem)
            .param(
                ParamSpec::required("target", String)
                    .with_prompt("Which file should I open?"),
            )
            .describe("Open a file by name, path, or search result number")
            .confirm("Opening {target}"),
        ActionSpec::new("open_folder", Capability::Filesystem)
            .param(ParamSpec::required("name", String).with_prompt("Which folder should I open?"))
            .describe("Open a folder")
            .confirm("Opening the {name} folder"),
        // === SYSTEM ===
        ActionSpec::new("launch_app", Capability::System)
            .param(ParamSpec::required("name", String).with_prompt("Which app should I open?"))
            .param(ParamSpec::optional("executable_hints", StringList))
            .alias("open_app")
            .describe("Launch an installed application")
            .confirm("Opening {name}"),
        ActionSpec::new("open_website", Capability::System)
            .param(ParamSpec::required("site", String).with_prompt("Which website should I open?"))
            .describe("Open a specific website")
            .confirm("Opening {site}"),
        ActionSpec::new("search_web", Capability::System)
            .param(ParamSpec::required("query", String).with_prompt("What should I search the web for?"))
            .describe("Run a web search")
            .confirm("Searching the web for {query}"),
        ActionSpec::new("run_command", Capability::System)
            .param(ParamSpec::required("command", String).with_prompt("Which command should I run?"))
            .alias("system_command")
            .non_idempotent()
            .describe("Execute a shell command")
            .confirm("Ran {command}"),
        // === VISION ===
        ActionSpec::new("analyze_screen", Capability::Vision)
            .param(
                ParamSpec::required("question", String)
                    .with_prompt("What should I look for on the screen?"),
            )
            .alias("screen_analyze")
            .describe("Answer a question about what is on screen")
            .confirm("Screen analyzed"),
        // === INPUT ===
        ActionSpec::new("click_screen", Capability::Input)
            .param(ParamSpec::required("target", String).with_prompt("What should I click on?"))
            .alias("screen_click")
            .non_idempotent()
            .describe("Find an element on screen and click it")
            .confirm("Clicked {target}"),
        ActionSpec::new("type_text", Capability::Input)
            .param(ParamSpec::required("text", String).with_prompt("What should I type?"))
            .non_idempotent()
            .describe("Type text at the cursor")
            .confirm("Typed it"),
        ActionSpec::new("press_key", Capability::Input)
            .param(ParamSpec::required("key", String).with_prompt("Which key should I press?"))
            .non_idempotent()
            .describe("Press a key or key combination")
            .confirm("Pressed {key}"),
        ActionSpec::new("scroll", Capability::Input)
            .param(ParamSpec::required("direction", String).with_prompt("Scroll up or down?"))
            .param(ParamSpec::optional("amount", Integer).with_default(3))
            .non_idempotent()
            .describe("Scroll the active window")
            .confirm("Scrolling {direction}"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_builtin_catalog_lookup() {
        let catalog = ActionCatalog::builtin();
        let spec = catalog.lookup("play_media").unwrap();
        assert_eq!(spec.capability, Capability::Media);
        assert!(spec.idempotent);

        assert!(!catalog.lookup("click_screen").unwrap().idempotent);
        assert!(catalog.lookup("teleport").is_none());
    }

    #[test]
    fn test_lookup_by_alias_is_case_insensitive() {
        let catalog = ActionCatalog::builtin();
        assert_eq!(catalog.lookup("PLAY_YOUTUBE").unwrap().kind, "play_media");
        assert_eq!(catalog.lookup("Open-App").unwrap().kind, "launch_app");
        assert_eq!(catalog.lookup("search files").unwrap().kind, "search_files");
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut catalog = ActionCatalog::builtin();
        let dup = ActionSpec::new("Play_Media", Capability::Media);
        assert!(matches!(catalog.register(dup), Err(AssistError::Catalog(_))));

        let alias_clash = ActionSpec::new("new_kind", Capability::System).alias("open_app");
        assert!(catalog.register(alias_clash).is_err());
        assert!(!catalog.contains("new_kind"));
    }

    #[test]
    fn test_validate_unknown_kind() {
        let catalog = ActionCatalog::builtin();
        let result = catalog.validate("fly", &Parameters::new(), ActionSource::Llm, 0.9);
        assert!(matches!(result, Err(AssistError::UnknownAction(k)) if k == "fly"));
    }

    #[test]
    fn test_validate_missing_required() {
        let catalog = ActionCatalog::builtin();
        let result = catalog.validate_parameters("search_files", &Parameters::new());
        assert!(matches!(result, Err(AssistError::MissingParameter(p)) if p == "query"));

        // blank strings count as missing
        let result = catalog.validate_parameters("search_files", &params(json!({"query": "  "})));
        assert!(matches!(result, Err(AssistError::MissingParameter(_))));
    }

    #[test]
    fn test_validate_type_mismatch() {
        let catalog = ActionCatalog::builtin();
        let raw = params(json!({"direction": "down", "amount": "three"}));
        match catalog.validate_parameters("scroll", &raw) {
            Err(AssistError::InvalidParameterType { name, expected, actual }) => {
                assert_eq!(name, "amount");
                assert_eq!(expected, "integer");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validate_fills_defaults_and_drops_unknown() {
        let catalog = ActionCatalog::builtin();
        let raw = params(json!({"direction": "up", "speed": "fast"}));
        let action = catalog
            .validate("scroll", &raw, ActionSource::Fallback, 0.5)
            .unwrap();
        assert_eq!(action.param_str("direction"), Some("up"));
        assert_eq!(action.param_i64("amount"), Some(3));
        assert!(!action.parameters.contains_key("speed"));
        assert_eq!(action.capability, Capability::Input);
        assert_eq!(action.source, ActionSource::Fallback);
    }

    #[test]
    fn test_validate_canonicalizes_alias() {
        let catalog = ActionCatalog::builtin();
        let action = catalog
            .validate(
                "PLAY_YOUTUBE",
                &params(json!({"query": "despacito"})),
                ActionSource::Llm,
                1.7,
            )
            .unwrap();
        assert_eq!(action.kind, "play_media");
        assert_eq!(action.confidence, 1.0);
    }

    #[test]
    fn test_string_list_type() {
        assert!(ParamType::StringList.matches(&json!(["chrome.exe", "chrome"])));
        assert!(!ParamType::StringList.matches(&json!(["chrome", 3])));
        assert!(!ParamType::StringList.matches(&json!("chrome")));
        assert!(ParamType::Number.matches(&json!(2.5)));
        assert!(!ParamType::Integer.matches(&json!(2.5)));
    }

    #[test]
    fn test_render_confirmation() {
        let catalog = ActionCatalog::builtin();
        let spec = catalog.lookup("play_media").unwrap();
        let text = spec.render_confirmation(&params(json!({"query": "despacito"})));
        assert_eq!(text, "Playing despacito");
    }

    #[test]
    fn test_signature() {
        let catalog = ActionCatalog::builtin();
        assert_eq!(
            catalog.lookup("scroll").unwrap().signature(),
            "scroll(direction: string, amount?: integer)"
        );
    }

    #[test]
    fn test_registration_order_is_stable() {
        let catalog = ActionCatalog::builtin();
        let kinds: Vec<_> = catalog.specs().map(|s| s.kind.as_str()).take(3).collect();
        assert_eq!(kinds, vec!["play_media", "search_media", "search_files"]);
        assert!(catalog.position("play_media") < catalog.position("search_web"));
    }
}
