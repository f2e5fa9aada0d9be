//! Error types for codelens-model.

use thiserror::Error;

/// Result type alias for codelens-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in codelens-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Configuration errors
    // ========================================================================
    /// API key environment variable is not set.
    #[error("API key not found: set the {env_var} environment variable")]
    MissingApiKey { env_var: String },

    /// Invalid model configuration.
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// The request could not be sent or timed out.
    #[error("Request to '{provider}' failed: {message}")]
    Request { provider: String, message: String },

    /// The service answered with a non-success status.
    #[error("'{provider}' returned HTTP {status}: {body}")]
    HttpStatus {
        provider: String,
        status: u16,
        body: String,
    },

    // ========================================================================
    // Response errors
    // ========================================================================
    /// The response body did not have the expected shape.
    #[error("Invalid model response: {message}")]
    InvalidResponse { message: String },

    /// Embedding generation failed.
    #[error("Embedding failed for model '{model_id}': {message}")]
    EmbeddingFailed { model_id: String, message: String },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create a request error.
    pub fn request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } | Self::InvalidResponse { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
