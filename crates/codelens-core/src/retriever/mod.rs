//! Context retrievers.
//!
//! Each retriever queries one backing store and turns its rows into
//! [`ContextItem`]s:
//!
//! - [`VectorRetriever`]: semantic similarity over embedded chunks
//! - [`CallGraphRetriever`]: function definitions, callers and callees
//! - [`DependencyRetriever`]: file include relationships
//!
//! ## Failure semantics
//!
//! `retrieve` never returns an error. Backend failures are logged and become an
//! empty [`RetrievalResult`] with `total_candidates == 0`, so one dead store
//! cannot abort the others.
//!
//! Ties in relevance score keep retrieval order.

mod call_graph;
mod dependency;
mod vector;

pub use call_graph::CallGraphRetriever;
pub use dependency::DependencyRetriever;
pub use vector::{VectorHit, VectorRetriever, VectorStore};

use std::time::Instant;

use tracing::{debug, warn};

use crate::context::{ContextItem, IntentAnalysis, RetrievalConfig, RetrievalResult, SourceType};
use crate::errors::CodelensResult;

/// A source of context items.
///
/// ## Sync Design
///
/// Retrievers block on their store. The builder runs them on worker threads,
/// so implementations must be `Send + Sync`.
pub trait ContextRetriever: Send + Sync {
    /// Retrieve context for a question. Never fails; see module docs.
    fn retrieve(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        config: &RetrievalConfig,
    ) -> RetrievalResult;

    /// Cheap liveness probe against the backing store.
    fn is_available(&self) -> bool;

    fn source_type(&self) -> SourceType;
}

/// Turn a fallible retrieval into a [`RetrievalResult`].
///
/// `candidates` are in final order. The score threshold and `top_k` from
/// `config` are applied here.
pub(crate) fn finish_retrieval(
    source: SourceType,
    started: Instant,
    candidates: CodelensResult<Vec<ContextItem>>,
    config: &RetrievalConfig,
) -> RetrievalResult {
    match candidates {
        Ok(items) => {
            let result = RetrievalResult::new(source, items, started.elapsed())
                .filter_by_score(config.min_relevance_score())
                .top_k(config.top_k());
            debug!(
                source = %source,
                candidates = result.total_candidates,
                returned = result.items.len(),
                elapsed_ms = result.query_time.as_millis() as u64,
                "Retrieval finished"
            );
            result
        }
        Err(e) => {
            warn!("{} retrieval failed, returning no context: {}", source, e);
            RetrievalResult::empty(source)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Graph store double shared by the graph retriever tests.

    use codelens_db::graph::{
        FunctionRecord, GraphStore, HeaderUsage, IncludeRecord, RelatedFunction,
    };
    use codelens_db::{DbError, DbResult};

    /// A graph store whose every query fails.
    pub struct BrokenGraph;

    impl GraphStore for BrokenGraph {
        fn query_function_by_name(&self, _: &str) -> DbResult<Option<FunctionRecord>> {
            Err(DbError::graph_unavailable("connection reset"))
        }
        fn query_callers(&self, _: &str) -> DbResult<Vec<RelatedFunction>> {
            Err(DbError::graph_unavailable("connection reset"))
        }
        fn query_callees(&self, _: &str) -> DbResult<Vec<RelatedFunction>> {
            Err(DbError::graph_unavailable("connection reset"))
        }
        fn query_file_includes(&self, _: &str) -> DbResult<Vec<IncludeRecord>> {
            Err(DbError::graph_unavailable("connection reset"))
        }
        fn query_file_included_by(&self, _: &str) -> DbResult<Vec<IncludeRecord>> {
            Err(DbError::graph_unavailable("connection reset"))
        }
        fn query_top_included_files(&self, _: usize) -> DbResult<Vec<HeaderUsage>> {
            Err(DbError::graph_unavailable("connection reset"))
        }
        fn search_functions(&self, _: &str, _: usize) -> DbResult<Vec<FunctionRecord>> {
            Err(DbError::graph_unavailable("connection reset"))
        }
        fn is_available(&self) -> bool {
            false
        }
    }
}
