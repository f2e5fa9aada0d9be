//! Error types for codelens-core.
//!
//! Only configuration and project-resolution errors escape the retrieval
//! pipeline. Store and model failures are converted into these variants at the
//! adapter boundary, then logged and degraded by the component that hit them.

use std::path::PathBuf;

use codelens_db::DbError;
use codelens_model::ModelError;
use thiserror::Error;

/// Domain-specific errors for CodeLens operations.
#[derive(Error, Debug)]
pub enum CodelensError {
    /// Global configuration file is invalid.
    #[error("Global config invalid: {0}")]
    InvalidGlobalConfig(String),

    /// Project configuration is invalid.
    #[error("Project config invalid: {0}")]
    InvalidProjectConfig(String),

    /// A configuration value is invalid.
    ///
    /// Raised eagerly at construction (e.g., topK=0, score threshold > 1).
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// A relevance score outside `[0.0, 1.0]` (or NaN).
    #[error("Relevance score {score} is outside [0.0, 1.0]")]
    InvalidRelevanceScore { score: f64 },

    /// The project root does not exist.
    #[error("Project not found: {0}")]
    ProjectNotFound(PathBuf),

    /// Backing store error.
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    /// Chat or embedding service error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl CodelensError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

/// Result alias for codelens-core operations.
pub type CodelensResult<T> = Result<T, CodelensError>;
