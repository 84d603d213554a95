//! Async LLM client for intent resolution
//!
//! This is a model-agnostic HTTP client for calling LLM APIs.
//! Supports both Anthropic and OpenAI-compatible APIs (OpenRouter, DeepSeek, etc).
//! The resolver only sees the `CompletionClient` trait, so tests and offline
//! runs can swap in scripted or absent models.

use crate::core::config::LlmSettings;
use crate::core::error::{AssistError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Intent replies are small; no need for long completions
const MAX_TOKENS: u32 = 1024;

/// Anything that can turn a prompt into text
///
/// Timeouts are the caller's business; implementations just do the call.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// API format type
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

/// Async LLM client for making API calls
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    api_format: ApiFormat,
}

impl LlmClient {
    /// Create a new LLM client with explicit configuration
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        let api_format = Self::detect_api_format(&api_url);
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            api_format,
        }
    }

    /// Detect API format from URL
    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            // OpenRouter, DeepSeek, OpenAI and other compatible APIs use OpenAI format
            ApiFormat::OpenAI
        }
    }

    /// Create a client from engine settings
    ///
    /// Fails when no usable API key is configured; the engine then runs on
    /// the fallback matcher alone.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        if !settings.is_configured() {
            return Err(AssistError::Llm("LLM API key not configured".into()));
        }
        let api_key = settings.api_key.clone().unwrap_or_default();
        let api_url = settings
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.into());
        let model = settings
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.into());
        Ok(Self::new(api_key, api_url, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_format(&self) -> &ApiFormat {
        &self.api_format
    }

    async fn complete_anthropic(&self, system: &str, user: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: system.into(),
            messages: vec![Message {
                role: "user".into(),
                content: user.into(),
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistError::Llm(format!("API error {}: {}", status, error_text)));
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AssistError::Llm(e.to_string()))?;

        completion
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| AssistError::Llm("Empty response".into()))
    }

    async fn complete_openai(&self, system: &str, user: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: system.into(),
                },
                Message {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistError::Llm(format!("API error {}: {}", status, error_text)));
        }

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AssistError::Llm(e.to_string()))?;

        completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| AssistError::Llm("Empty response".into()))
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(system, user).await,
            ApiFormat::OpenAI => self.complete_openai(system, user).await,
        }
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

// OpenAI-compatible API format
#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    // reasoning models may return null content
    content: Option<String>,
}

// Shared
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(
            "test-key".into(),
            "https://api.example.com".into(),
            "test-model".into(),
        );
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_url, "https://api.example.com");
        assert_eq!(client.model(), "test-model");
        assert_eq!(client.api_format(), &ApiFormat::OpenAI);
    }

    #[test]
    fn test_detect_anthropic_format() {
        let client = LlmClient::new(
            "test-key".into(),
            DEFAULT_API_URL.into(),
            "test-model".into(),
        );
        assert_eq!(client.api_format(), &ApiFormat::Anthropic);
    }

    #[test]
    fn test_from_settings_requires_key() {
        let result = LlmClient::from_settings(&LlmSettings::default());
        assert!(matches!(result, Err(AssistError::Llm(_))));
    }

    #[test]
    fn test_from_settings_defaults() {
        let settings = LlmSettings {
            api_key: Some("sk-0123456789abcdef".into()),
            api_url: Some("https://openrouter.ai/api/v1/chat/completions".into()),
            model: None,
        };
        let client = LlmClient::from_settings(&settings).unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.api_format(), &ApiFormat::OpenAI);
    }

    #[test]
    fn test_openai_null_content_deserializes() {
        let json = r#"{"choices": [{"message": {"content": null}}]}"#;
        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert!(response.choices[0].message.content.is_none());
    }
}
