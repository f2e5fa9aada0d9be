//! Chat-completion client for OpenAI-compatible endpoints.

use crate::config::ChatConfig;
use crate::error::{ModelError, ModelResult};
use crate::ChatModel;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

// ============================================================================
// Messages
// ============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// OpenAiCompatibleChatModel
// ============================================================================

/// Chat model speaking the OpenAI chat-completions protocol
/// (OpenRouter, OpenAI, Ollama's `/v1` endpoint).
#[derive(Debug)]
pub struct OpenAiCompatibleChatModel {
    client: reqwest::blocking::Client,
    config: ChatConfig,
    model_id: String,
}

impl OpenAiCompatibleChatModel {
    pub fn new(config: &ChatConfig) -> ModelResult<Self> {
        if config.endpoint().trim().is_empty() {
            return Err(ModelError::invalid_config("chat endpoint URL is empty"));
        }

        let model_id = config.effective_model_id();
        if model_id.trim().is_empty() {
            return Err(ModelError::invalid_config("chat model ID is empty"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ModelError::invalid_config(format!("failed to build HTTP client: {}", e)))?;

        debug!(
            "Chat model '{}' via {} ({})",
            model_id,
            config.provider,
            config.endpoint()
        );

        Ok(Self {
            client,
            config: config.clone(),
            model_id,
        })
    }

    fn api_key(&self) -> ModelResult<Option<String>> {
        if !self.config.provider.requires_api_key() {
            return Ok(None);
        }
        match std::env::var(&self.config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(ModelError::MissingApiKey {
                env_var: self.config.api_key_env.clone(),
            }),
        }
    }
}

impl ChatModel for OpenAiCompatibleChatModel {
    fn chat(&self, messages: &[ChatMessage]) -> ModelResult<String> {
        let provider = self.config.provider.to_string();
        let body = CompletionRequest {
            model: &self.model_id,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut request = self.client.post(self.config.endpoint()).json(&body);
        if let Some(key) = self.api_key()? {
            request = request.bearer_auth(key);
        }

        trace!("POST {} ({} messages)", self.config.endpoint(), messages.len());
        let response = request
            .send()
            .map_err(|e| ModelError::request(&provider, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::HttpStatus {
                provider,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .map_err(|e| ModelError::invalid_response(format!("malformed completion: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        trace!("Chat reply: {} chars", content.len());
        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatProviderKind;

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("be terse"), ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: "m",
            messages: &messages,
            max_tokens: 10,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 10);
    }

    #[test]
    fn test_response_without_content_is_empty() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn test_empty_endpoint_is_rejected() {
        let config = ChatConfig::default().with_base_url("  ");
        assert!(matches!(
            OpenAiCompatibleChatModel::new(&config),
            Err(ModelError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_unreachable_endpoint_is_request_error() {
        let config = ChatConfig::default()
            .with_provider(ChatProviderKind::Ollama)
            .with_base_url("http://127.0.0.1:9/v1/chat/completions")
            .with_timeout_secs(2);
        let model = OpenAiCompatibleChatModel::new(&config).unwrap();

        let err = model.chat(&[ChatMessage::user("ping")]).unwrap_err();
        assert!(err.is_transient());
    }
}
