//! Semantic similarity retriever.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{finish_retrieval, ContextRetriever};
use crate::context::{
    deduplicate_by_content, sort_by_score_desc, ContextItem, EntityKind, IntentAnalysis,
    RetrievalConfig, RetrievalResult, SourceType, META_RELATION_TYPE,
};
use crate::errors::CodelensResult;

// ============================================================================
// VectorStore
// ============================================================================

/// One similarity search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub content: String,
    /// Similarity, higher is better. Expected within `[0, 1]`.
    pub score: f64,
    pub metadata: Map<String, Value>,
}

/// Text-in similarity search over embedded chunks.
pub trait VectorStore: Send + Sync {
    /// Up to `top_k` chunks most similar to `query`, best first.
    fn similarity_search(&self, query: &str, top_k: usize) -> CodelensResult<Vec<VectorHit>>;

    fn is_available(&self) -> bool;
}

// ============================================================================
// VectorRetriever
// ============================================================================

/// Retrieves chunks by semantic similarity.
///
/// With keywords present, three queries run against the store: the raw
/// question, the keywords joined, and the entity names joined. Hits are
/// merged, deduplicated by content and sorted by score.
pub struct VectorRetriever {
    store: Arc<dyn VectorStore>,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    fn try_retrieve(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        config: &RetrievalConfig,
    ) -> CodelensResult<Vec<ContextItem>> {
        let queries = build_queries(query, intent);

        let mut items = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0;

        for sub_query in &queries {
            match self.store.similarity_search(sub_query, config.top_k()) {
                Ok(hits) => {
                    succeeded += 1;
                    for hit in hits {
                        items.push(to_item(hit, sub_query)?);
                    }
                }
                Err(e) => {
                    warn!("Vector sub-query {:?} failed: {}", sub_query, e);
                    last_error = Some(e);
                }
            }
        }

        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        debug!(
            "Vector search: {} queries, {} raw hits",
            queries.len(),
            items.len()
        );

        let mut items = deduplicate_by_content(items);
        sort_by_score_desc(&mut items);
        Ok(items)
    }
}

impl ContextRetriever for VectorRetriever {
    fn retrieve(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        config: &RetrievalConfig,
    ) -> RetrievalResult {
        let started = Instant::now();
        let candidates = self.try_retrieve(query, intent, config);
        finish_retrieval(SourceType::Vector, started, candidates, config)
    }

    fn is_available(&self) -> bool {
        self.store.is_available()
    }

    fn source_type(&self) -> SourceType {
        SourceType::Vector
    }
}

/// Queries to run, without duplicates or blanks.
fn build_queries(query: &str, intent: &IntentAnalysis) -> Vec<String> {
    let mut queries = vec![query.trim().to_string()];

    if !intent.keywords.is_empty() {
        queries.push(
            intent
                .keywords
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        );

        let entities: Vec<&str> = intent
            .entities
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Function | EntityKind::File))
            .map(|e| e.name.as_str())
            .collect();
        queries.push(entities.join(" "));
    }

    let mut unique: Vec<String> = Vec::with_capacity(queries.len());
    for q in queries {
        if !q.is_empty() && !unique.contains(&q) {
            unique.push(q);
        }
    }
    unique
}

fn to_item(hit: VectorHit, sub_query: &str) -> CodelensResult<ContextItem> {
    // Stores may report cosine similarity slightly outside [0, 1].
    let score = if hit.score.is_nan() {
        0.0
    } else {
        hit.score.clamp(0.0, 1.0)
    };

    Ok(ContextItem::new(hit.content, SourceType::Vector, score)?
        .with_metadata_map(hit.metadata)
        .with_metadata(META_RELATION_TYPE, "semantic")
        .with_metadata("matched_query", sub_query))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CodelensError;
    use codelens_db::DbError;
    use std::sync::Mutex;

    /// Returns canned hits per query and records every query.
    #[derive(Default)]
    struct CannedStore {
        hits: Vec<(&'static str, Vec<(&'static str, f64)>)>,
        fail_on: Option<&'static str>,
        seen: Mutex<Vec<String>>,
    }

    impl VectorStore for CannedStore {
        fn similarity_search(&self, query: &str, top_k: usize) -> CodelensResult<Vec<VectorHit>> {
            self.seen.lock().unwrap().push(query.to_string());
            if self.fail_on == Some(query) || self.fail_on == Some("*") {
                return Err(CodelensError::Store(DbError::internal("index offline")));
            }
            Ok(self
                .hits
                .iter()
                .find(|(q, _)| *q == query)
                .map(|(_, hits)| hits.as_slice())
                .unwrap_or(&[])
                .iter()
                .take(top_k)
                .map(|(content, score)| VectorHit {
                    content: content.to_string(),
                    score: *score,
                    metadata: Map::new(),
                })
                .collect())
        }

        fn is_available(&self) -> bool {
            self.fail_on.is_none()
        }
    }

    fn intent_with_keywords() -> IntentAnalysis {
        let mut intent = IntentAnalysis::default();
        intent.add_entity("sbi_init", EntityKind::Function);
        intent.keywords.insert("boot".to_string());
        intent.keywords.insert("platform".to_string());
        intent
    }

    #[test]
    fn test_single_query_without_keywords() {
        let store = Arc::new(CannedStore::default());
        let retriever = VectorRetriever::new(store.clone());

        retriever.retrieve("what is this?", &IntentAnalysis::default(), &RetrievalConfig::default());
        assert_eq!(*store.seen.lock().unwrap(), ["what is this?"]);
    }

    #[test]
    fn test_multi_query_merges_dedups_and_sorts() {
        let store = Arc::new(CannedStore {
            hits: vec![
                ("how does sbi_init boot?", vec![("chunk A", 0.6), ("chunk B", 0.5)]),
                ("boot platform", vec![("chunk C", 0.9), ("chunk A", 0.6)]),
                ("sbi_init", vec![("chunk D", 0.6)]),
            ],
            ..CannedStore::default()
        });
        let retriever = VectorRetriever::new(store.clone());
        let config = RetrievalConfig::new(3, true, 5.0, 0.0).unwrap();

        let result = retriever.retrieve("how does sbi_init boot?", &intent_with_keywords(), &config);

        assert_eq!(store.seen.lock().unwrap().len(), 3);
        let contents: Vec<&str> = result.items.iter().map(|i| i.content()).collect();
        // C first by score; A before D on the tie (retrieval order); B cut by top_k
        assert_eq!(contents, ["chunk C", "chunk A", "chunk D"]);
        assert_eq!(result.total_candidates, 4);
        assert_eq!(result.items[0].metadata_str("matched_query"), Some("boot platform"));
    }

    #[test]
    fn test_scores_are_clamped() {
        let store = Arc::new(CannedStore {
            hits: vec![("q", vec![("over", 1.2), ("under", -0.3)])],
            ..CannedStore::default()
        });
        let result = VectorRetriever::new(store).retrieve(
            "q",
            &IntentAnalysis::default(),
            &RetrievalConfig::default(),
        );
        assert_eq!(result.items[0].relevance_score(), 1.0);
        assert_eq!(result.items[1].relevance_score(), 0.0);
    }

    #[test]
    fn test_partial_failure_keeps_other_queries() {
        let store = Arc::new(CannedStore {
            hits: vec![("sbi_init", vec![("chunk D", 0.6)])],
            fail_on: Some("boot platform"),
            ..CannedStore::default()
        });
        let result = VectorRetriever::new(store).retrieve(
            "how does sbi_init boot?",
            &intent_with_keywords(),
            &RetrievalConfig::default(),
        );
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn test_total_failure_is_empty_result() {
        let store = Arc::new(CannedStore {
            fail_on: Some("*"),
            ..CannedStore::default()
        });
        let result = VectorRetriever::new(store).retrieve(
            "how does sbi_init boot?",
            &intent_with_keywords(),
            &RetrievalConfig::default(),
        );
        assert!(result.is_empty());
        assert_eq!(result.total_candidates, 0);
    }

    #[test]
    fn test_min_relevance_filter() {
        let store = Arc::new(CannedStore {
            hits: vec![("q", vec![("high", 0.8), ("low", 0.2)])],
            ..CannedStore::default()
        });
        let config = RetrievalConfig::new(10, true, 5.0, 0.5).unwrap();
        let result = VectorRetriever::new(store).retrieve("q", &IntentAnalysis::default(), &config);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].content(), "high");
    }
}
