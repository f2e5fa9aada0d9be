//! Vector index backend implementations.

mod simple;

pub use simple::SimpleFileVectorIndex;

use super::config::VectorIndexConfig;
use super::traits::VectorIndexBackend;
use crate::error::DbResult;
use std::sync::Arc;
use tracing::debug;

/// Open a vector index with the given configuration.
///
/// A missing index directory opens as an empty index; the index directory is
/// only created on the first `upsert`.
pub fn open_vector_index(config: &VectorIndexConfig) -> DbResult<Arc<dyn VectorIndexBackend>> {
    debug!("Opening vector index at {:?}", config.path);
    Ok(Arc::new(SimpleFileVectorIndex::open(config)?))
}
