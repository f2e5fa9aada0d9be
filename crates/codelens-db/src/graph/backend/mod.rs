//! Graph store backend implementations.

mod jsonl;

pub use jsonl::JsonlGraphStore;

use super::traits::{GraphStore, GraphStoreConfig};
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tracing::debug;

/// Open a graph store with the given configuration.
///
/// A missing directory yields an empty store whose `is_available()` reports
/// `false`, unless `require_existing` is set.
///
/// # Errors
///
/// Returns an error if the directory is required but missing, or if a data
/// file exists but cannot be read.
pub fn open_graph_store(config: &GraphStoreConfig) -> DbResult<Arc<dyn GraphStore>> {
    debug!("Opening graph store at {:?}", config.path);

    if config.require_existing && !config.path.is_dir() {
        return Err(DbError::graph_unavailable(format!(
            "graph directory {} does not exist",
            config.path.display()
        )));
    }

    Ok(Arc::new(JsonlGraphStore::open(&config.path)?))
}
