//! Error types for codelens-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for codelens-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in codelens-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Graph store errors
    // ========================================================================
    /// Graph store I/O error.
    #[error("Graph store I/O error at {path}: {message}")]
    GraphIo { path: PathBuf, message: String },

    /// Graph store could not be reached or is not loaded.
    #[error("Graph store unavailable: {message}")]
    GraphUnavailable { message: String },

    /// Graph query error.
    #[error("Graph query failed: {message}")]
    GraphQuery { message: String },

    // ========================================================================
    // Vector index errors
    // ========================================================================
    /// Vector index I/O error.
    #[error("Vector index I/O error at {path}: {message}")]
    VectorIo { path: PathBuf, message: String },

    /// Vector dimension mismatch.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector index not found.
    #[error("Vector index not found at {path}")]
    IndexNotFound { path: PathBuf },

    // ========================================================================
    // General errors
    // ========================================================================
    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a graph I/O error.
    pub fn graph_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::GraphIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a graph unavailable error.
    pub fn graph_unavailable(message: impl Into<String>) -> Self {
        Self::GraphUnavailable {
            message: message.into(),
        }
    }

    /// Create a graph query error.
    pub fn graph_query(message: impl Into<String>) -> Self {
        Self::GraphQuery {
            message: message.into(),
        }
    }

    /// Create a vector I/O error.
    pub fn vector_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
