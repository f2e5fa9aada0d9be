//! Adapter layer between codelens-core and its backing services.
//!
//! ```text
//! retrievers (VectorStore / GraphStore traits)
//!        ↓
//!   db_adapter (this module)
//!        ↓
//! codelens-db indexes + codelens-model embeddings
//! ```
//!
//! The graph store is used as-is through [`codelens_db::graph::GraphStore`].
//! Similarity search needs an embedding step first, which
//! [`EmbeddedVectorStore`] provides.

use std::sync::Arc;

use codelens_db::vector::{VectorIndexBackend, VectorSearchResult};
use codelens_model::EmbeddingModel;
use tracing::{trace, warn};

use crate::errors::{CodelensError, CodelensResult};
use crate::retriever::{VectorHit, VectorStore};

/// Metadata key holding the index id of a vector hit.
pub const META_VECTOR_ID: &str = "vector_id";

// ============================================================================
// EmbeddedVectorStore
// ============================================================================

/// Text similarity search: embed the query, then search the index.
pub struct EmbeddedVectorStore {
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndexBackend>,
}

impl EmbeddedVectorStore {
    /// Pair an embedding model with an index built from the same model.
    ///
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidConfiguration`] if the model and index
    /// dimensions differ.
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        index: Arc<dyn VectorIndexBackend>,
    ) -> CodelensResult<Self> {
        if embedder.dimension() != index.dimension() {
            return Err(CodelensError::invalid_configuration(
                format!(
                    "embedding model '{}' has dimension {} but the vector index has {}",
                    embedder.model_id(),
                    embedder.dimension(),
                    index.dimension()
                ),
                "Set embedding.dimension to match the index, or rebuild the index",
            ));
        }
        Ok(Self { embedder, index })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> CodelensResult<usize> {
        Ok(self.index.len()?)
    }

    pub fn is_empty(&self) -> CodelensResult<bool> {
        Ok(self.index.is_empty()?)
    }
}

impl VectorStore for EmbeddedVectorStore {
    fn similarity_search(&self, query: &str, top_k: usize) -> CodelensResult<Vec<VectorHit>> {
        let embedding = self.embedder.embed_one(query)?;
        let results = self.index.query(&embedding, top_k)?;
        trace!("Similarity search for {:?}: {} hits", query, results.len());
        Ok(results.into_iter().map(to_hit).collect())
    }

    /// Available when the index holds at least one chunk. The embedding
    /// service is not probed here.
    fn is_available(&self) -> bool {
        match self.index.is_empty() {
            Ok(empty) => !empty,
            Err(e) => {
                warn!("Vector index unreadable: {}", e);
                false
            }
        }
    }
}

fn to_hit(result: VectorSearchResult) -> VectorHit {
    let mut metadata = result.metadata;
    metadata.insert(META_VECTOR_ID.to_string(), result.id.value().into());
    VectorHit {
        content: result.content,
        score: f64::from(result.score),
        metadata,
    }
}

// ============================================================================
// Tests
// ============================================================================
