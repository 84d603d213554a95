use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid type for parameter {name}: expected {expected}, got {actual}")]
    InvalidParameterType {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AssistError {
    /// True for the errors produced by catalog validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AssistError::UnknownAction(_)
                | AssistError::MissingParameter(_)
                | AssistError::InvalidParameterType { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AssistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(AssistError::UnknownAction("fly".into()).is_validation());
        assert!(AssistError::MissingParameter("query".into()).is_validation());
        assert!(!AssistError::Llm("timeout".into()).is_validation());
        assert!(!AssistError::Config("bad".into()).is_validation());
    }

    #[test]
    fn test_invalid_type_message() {
        let err = AssistError::InvalidParameterType {
            name: "amount".into(),
            expected: "integer".into(),
            actual: "string".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid type for parameter amount: expected integer, got string"
        );
    }
}
