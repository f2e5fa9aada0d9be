//! # codelens-model
//!
//! Model access layer for CodeLens - LLM chat completion and text embeddings.
//!
//! It provides:
//!
//! - **Chat models**: `chat(messages) -> text` used by intent analysis and
//!   reranking ([`ChatModel`])
//! - **Embedding models**: text → vector for the semantic index ([`EmbeddingModel`])
//! - **Unified config**: [`ChatConfig`] and [`EmbeddingConfig`]
//!
//! ## Design Principles
//!
//! 1. **Production-only**: No mock implementations. Test doubles live in consuming crates.
//! 2. **Untrusted output**: Chat responses are returned as raw text; parsing is
//!    the caller's responsibility.
//! 3. **Provider-agnostic**: Traits don't leak HTTP details.
//!
//! ## Usage
//!
//! ```ignore
//! use codelens_model::{create_chat_model, ChatConfig, ChatMessage};
//!
//! let model = create_chat_model(&ChatConfig::default())?;
//! let reply = model.chat(&[ChatMessage::user("Please respond with 'OK'.")])?;
//! ```

pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;

// Re-export error types
pub use error::{ModelError, ModelResult};

// Re-export config types
pub use config::{ChatConfig, ChatProviderKind, EmbeddingConfig};

pub use chat::{ChatMessage, ChatRole, OpenAiCompatibleChatModel};
pub use embedding::OllamaEmbeddingModel;

// ============================================================================
// Chat Model Trait
// ============================================================================

/// Trait for chat-completion models.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one instance is shared by the
/// intent analyzer and the reranker across requests.
pub trait ChatModel: Send + Sync + std::fmt::Debug {
    /// Send a conversation and return the assistant's reply text.
    ///
    /// An empty reply is returned as `Ok("")`; callers decide whether that is
    /// a failure.
    fn chat(&self, messages: &[ChatMessage]) -> ModelResult<String>;

    /// Get the model ID.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Embedding Model Trait
// ============================================================================

/// Trait for embedding models.
pub trait EmbeddingModel: Send + Sync + std::fmt::Debug {
    /// Generate embeddings for a batch of texts, one vector per input.
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> ModelResult<Vec<f32>> {
        self.embed(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::invalid_response("embedding response was empty"))
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the model ID.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create a chat model from configuration.
///
/// A missing API key is not an error here; it surfaces as
/// `ModelError::MissingApiKey` on the first `chat` call so callers can degrade.
///
/// # Errors
///
/// Returns `ModelError::InvalidConfig` for an empty endpoint or model ID.
pub fn create_chat_model(config: &ChatConfig) -> ModelResult<Box<dyn ChatModel>> {
    Ok(Box::new(OpenAiCompatibleChatModel::new(config)?))
}

/// Create an embedding model from configuration.
pub fn create_embedding_model(config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    Ok(Box::new(OllamaEmbeddingModel::new(config)?))
}
