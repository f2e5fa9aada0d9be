//! Configuration types for codelens-model.
//!
//! These are the canonical configuration types for the chat and embedding
//! services; `codelens-core` embeds them in its global config.

use serde::{Deserialize, Serialize};

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OLLAMA_CHAT_URL: &str = "http://localhost:11434/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL_ID: &str = "google/gemini-2.0-flash-001";
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Environment variable overriding the configured chat model.
pub const CHAT_MODEL_ENV: &str = "OPENROUTER_MODEL";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "nomic-embed-text";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

// ============================================================================
// ChatProviderKind
// ============================================================================

/// Chat provider. All providers speak the OpenAI chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatProviderKind {
    /// OpenRouter (default).
    #[default]
    OpenRouter,
    /// OpenAI.
    OpenAi,
    /// Local Ollama through its OpenAI-compatible endpoint. No API key.
    Ollama,
}

impl ChatProviderKind {
    /// Default endpoint URL for the provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenRouter => DEFAULT_OPENROUTER_URL,
            Self::OpenAi => DEFAULT_OPENAI_URL,
            Self::Ollama => DEFAULT_OLLAMA_CHAT_URL,
        }
    }

    /// Whether requests must carry a bearer token.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl std::fmt::Display for ChatProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenRouter => write!(f, "openrouter"),
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ChatProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAi),
            "ollama" | "local" => Ok(Self::Ollama),
            _ => Err(format!(
                "Unknown chat provider: '{}'. Use 'openrouter', 'openai', or 'ollama'.",
                s
            )),
        }
    }
}

// ============================================================================
// ChatConfig
// ============================================================================

/// Configuration for the chat-completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    #[serde(default)]
    pub provider: ChatProviderKind,

    /// Full chat-completions URL. Defaults to the provider's endpoint.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_chat_model_id")]
    pub model_id: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_chat_model_id() -> String {
    DEFAULT_CHAT_MODEL_ID.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ChatProviderKind::default(),
            base_url: None,
            model_id: default_chat_model_id(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ChatConfig {
    /// Endpoint actually used for requests.
    pub fn endpoint(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Model ID after applying the `OPENROUTER_MODEL` override.
    pub fn effective_model_id(&self) -> String {
        std::env::var(CHAT_MODEL_ENV)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.model_id.clone())
    }

    /// Set the endpoint URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: ChatProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// ============================================================================
// EmbeddingConfig
// ============================================================================

/// Configuration for the embedding service (Ollama `/api/embed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model_id")]
    pub model_id: String,

    /// Embedding dimension; must match the vector index.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_embedding_model_id() -> String {
    DEFAULT_EMBEDDING_MODEL_ID.to_string()
}

fn default_embedding_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model_id: default_embedding_model_id(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
