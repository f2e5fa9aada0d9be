//! Vector index traits and core types.

use crate::error::DbResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// VectorId
// ============================================================================

/// Unique identifier for a vector in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(pub u64);

impl VectorId {
    pub fn new(id: u64) -> Self {
        VectorId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for VectorId {
    fn from(id: u64) -> Self {
        VectorId(id)
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VectorMetric
// ============================================================================

/// Similarity metric for vector search. Scores are always "higher is better".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Dot product.
    Dot,
}

impl VectorMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Dot => "dot",
        }
    }
}

impl std::fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// VectorInsert
// ============================================================================

/// An embedded chunk to insert or replace in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorInsert {
    pub id: VectorId,

    pub vector: Vec<f32>,

    /// Chunk text returned verbatim by searches.
    pub content: String,

    /// Free-form metadata (file path, function name, line range, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl VectorInsert {
    pub fn new(id: impl Into<VectorId>, vector: Vec<f32>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vector,
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Add one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// VectorSearchResult
// ============================================================================

/// A single result from a vector similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchResult {
    pub id: VectorId,

    /// Similarity score, higher is better.
    pub score: f32,

    pub content: String,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// VectorIndexBackend Trait
// ============================================================================

/// Trait for vector index backend implementations.
///
/// ## Sync Design
///
/// This trait is synchronous and shared across worker threads.
pub trait VectorIndexBackend: Send + Sync {
    /// Return up to `limit` entries most similar to `embedding`, best first.
    fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<VectorSearchResult>>;

    /// Insert or replace entries by id.
    ///
    /// Retrieval only reads. This is the seeding path for test fixtures and
    /// for tools that build an index; nothing in the query pipeline calls it.
    fn upsert(&self, vectors: &[VectorInsert]) -> DbResult<()>;

    /// Number of stored entries.
    fn len(&self) -> DbResult<usize>;

    /// Whether the index holds no entries.
    fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }

    fn dimension(&self) -> usize;

    fn metric(&self) -> VectorMetric;
}

// ============================================================================
// Tests
// ============================================================================
