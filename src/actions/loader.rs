//! Load extra action specs from TOML files
//!
//! ```toml
//! [[action]]
//! kind = "open_mail"
//! capability = "system"
//! aliases = ["mail"]
//! confirmation = "Opening mail for {account}"
//!
//! [[action.params]]
//! name = "account"
//! type = "string"
//! required = false
//! default = "personal"
//! ```

use crate::actions::catalog::{ActionCatalog, ActionSpec, ParamSpec, ParamType};
use crate::core::error::{AssistError, Result};
use crate::core::types::Capability;
use std::fs;
use std::path::Path;
use tracing::info;

/// Load specs from a TOML file and register them after the existing ones
pub fn load_catalog_file(catalog: &mut ActionCatalog, path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path).map_err(|e| {
        AssistError::Catalog(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let specs = parse_catalog_toml(&content)?;
    let count = specs.len();
    for spec in specs {
        catalog.register(spec)?;
    }
    info!(path = %path.display(), count, "loaded catalog entries");
    Ok(count)
}

/// Parse `[[action]]` tables into specs, in file order
pub fn parse_catalog_toml(content: &str) -> Result<Vec<ActionSpec>> {
    let toml: toml::Value = content.parse()?;

    let Some(actions) = toml.get("action") else {
        return Ok(Vec::new());
    };
    let actions = actions
        .as_array()
        .ok_or_else(|| AssistError::Catalog("`action` must be an array of tables".into()))?;

    actions
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_action(i, entry))
        .collect()
}

fn parse_action(index: usize, entry: &toml::Value) -> Result<ActionSpec> {
    let table = entry
        .as_table()
        .ok_or_else(|| AssistError::Catalog(format!("action #{} is not a table", index)))?;

    let kind = table
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AssistError::Catalog(format!("action #{} is missing `kind`", index)))?;

    let capability = table
        .get("capability")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AssistError::Catalog(format!("{}: missing `capability`", kind)))?;
    let capability = Capability::parse(capability)
        .ok_or_else(|| AssistError::Catalog(format!("{}: unknown capability {}", kind, capability)))?;

    let mut spec = ActionSpec::new(kind, capability);

    if let Some(false) = table.get("idempotent").and_then(|v| v.as_bool()) {
        spec = spec.non_idempotent();
    }
    if let Some(description) = table.get("description").and_then(|v| v.as_str()) {
        spec = spec.describe(description);
    }
    if let Some(template) = table.get("confirmation").and_then(|v| v.as_str()) {
        spec = spec.confirm(template);
    }
    if let Some(aliases) = table.get("aliases").and_then(|v| v.as_array()) {
        for alias in aliases.iter().filter_map(|a| a.as_str()) {
            spec = spec.alias(alias);
        }
    }

    if let Some(params) = table.get("params").and_then(|v| v.as_array()) {
        for param in params {
            spec = spec.param(parse_param(kind, param)?);
        }
    }

    Ok(spec)
}

fn parse_param(kind: &str, value: &toml::Value) -> Result<ParamSpec> {
    let table = value
        .as_table()
        .ok_or_else(|| AssistError::Catalog(format!("{}: param is not a table", kind)))?;

    let name = table
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AssistError::Catalog(format!("{}: param missing `name`", kind)))?;

    let ty_name = table.get("type").and_then(|v| v.as_str()).unwrap_or("string");
    let ty = ParamType::parse(ty_name).ok_or_else(|| {
        AssistError::Catalog(format!("{}.{}: unknown type {}", kind, name, ty_name))
    })?;

    let required = table
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let mut param = if required {
        ParamSpec::required(name, ty)
    } else {
        ParamSpec::optional(name, ty)
    };

    if let Some(default) = table.get("default") {
        let default = serde_json::to_value(default)?;
        if !ty.matches(&default) {
            return Err(AssistError::Catalog(format!(
                "{}.{}: default does not match type {}",
                kind,
                name,
                ty.name()
            )));
        }
        param = param.with_default(default);
    }
    if let Some(prompt) = table.get("prompt").and_then(|v| v.as_str()) {
        param = param.with_prompt(prompt);
    }

    Ok(param)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIL: &str = r#"
        [[action]]
        kind = "open_mail"
        capability = "system"
        aliases = ["mail"]
        description = "Open the mail client"
        confirmation = "Opening mail for {account}"

        [[action.params]]
        name = "account"
        type = "string"
        required = false
        default = "personal"

        [[action]]
        kind = "volume"
        capability = "system"
        idempotent = false

        [[action.params]]
        name = "level"
        type = "integer"
        prompt = "What volume level?"
    "#;

    #[test]
    fn test_parse_catalog_toml() {
        let specs = parse_catalog_toml(MAIL).unwrap();
        assert_eq!(specs.len(), 2);

        let mail = &specs[0];
        assert_eq!(mail.kind, "open_mail");
        assert_eq!(mail.capability, Capability::System);
        assert_eq!(mail.aliases, vec!["mail".to_string()]);
        assert!(mail.idempotent);
        let account = mail.get_param("account").unwrap();
        assert!(!account.required);
        assert_eq!(account.default, Some(serde_json::json!("personal")));

        let volume = &specs[1];
        assert!(!volume.idempotent);
        let level = volume.get_param("level").unwrap();
        assert!(level.required);
        assert_eq!(level.ty, ParamType::Integer);
        assert_eq!(level.clarify_prompt(), "What volume level?");
    }

    #[test]
    fn test_empty_file_has_no_specs() {
        assert!(parse_catalog_toml("").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_capability_is_rejected() {
        let toml = r#"
            [[action]]
            kind = "teleport"
            capability = "magic"
        "#;
        let err = parse_catalog_toml(toml).unwrap_err();
        assert!(err.to_string().contains("unknown capability"));
    }

    #[test]
    fn test_mistyped_default_is_rejected() {
        let toml = r#"
            [[action]]
            kind = "zoom"
            capability = "input"

            [[action.params]]
            name = "factor"
            type = "integer"
            default = "big"
        "#;
        assert!(parse_catalog_toml(toml).is_err());
    }

    #[test]
    fn test_loaded_specs_extend_builtin_catalog() {
        let mut catalog = ActionCatalog::builtin();
        let before = catalog.len();
        for spec in parse_catalog_toml(MAIL).unwrap() {
            catalog.register(spec).unwrap();
        }
        assert_eq!(catalog.len(), before + 2);
        assert_eq!(catalog.lookup("mail").unwrap().kind, "open_mail");
    }
}
