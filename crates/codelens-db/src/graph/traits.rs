//! Graph store traits and configuration.
//!
//! This module defines the query abstraction the retrievers depend on.

use crate::error::DbResult;
use std::path::PathBuf;

use super::entities::{FunctionRecord, HeaderUsage, IncludeRecord, RelatedFunction};

// ============================================================================
// GraphStoreConfig
// ============================================================================

/// Configuration for opening a graph store.
#[derive(Debug, Clone)]
pub struct GraphStoreConfig {
    /// Path to the graph store directory.
    pub path: PathBuf,

    /// Fail on open when the directory is missing instead of opening an
    /// empty, unavailable store.
    pub require_existing: bool,
}

impl GraphStoreConfig {
    /// Create a new graph store configuration.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            require_existing: false,
        }
    }

    /// Require the store directory to exist at open time.
    pub fn with_require_existing(mut self, require: bool) -> Self {
        self.require_existing = require;
        self
    }
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// Read-only queries over the function/call/include graph.
///
/// File path arguments may be given either as stored (relative to the project
/// root) or as a bare file name; backends match on a trailing path component.
///
/// ## Sync Design
///
/// This trait is synchronous. Callers that need concurrency run queries on
/// worker threads; implementations must therefore be `Send + Sync`.
pub trait GraphStore: Send + Sync {
    /// Look up a function definition by exact name.
    fn query_function_by_name(&self, name: &str) -> DbResult<Option<FunctionRecord>>;

    /// Functions that call `name`.
    fn query_callers(&self, name: &str) -> DbResult<Vec<RelatedFunction>>;

    /// Functions called by `name`.
    fn query_callees(&self, name: &str) -> DbResult<Vec<RelatedFunction>>;

    /// Include edges whose source is `path`.
    fn query_file_includes(&self, path: &str) -> DbResult<Vec<IncludeRecord>>;

    /// Include edges whose target is `path`.
    fn query_file_included_by(&self, path: &str) -> DbResult<Vec<IncludeRecord>>;

    /// The most included files, most used first.
    fn query_top_included_files(&self, limit: usize) -> DbResult<Vec<HeaderUsage>>;

    /// Functions whose name or body contains `keyword` (case-insensitive).
    fn search_functions(&self, keyword: &str, limit: usize) -> DbResult<Vec<FunctionRecord>>;

    /// Cheap liveness probe.
    fn is_available(&self) -> bool;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_store_config() {
        let config = GraphStoreConfig::new("/path/to/graph").with_require_existing(true);

        assert_eq!(config.path, PathBuf::from("/path/to/graph"));
        assert!(config.require_existing);
    }
}
