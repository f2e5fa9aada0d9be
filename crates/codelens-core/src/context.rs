//! Shared value types passed between the analyzer, retrievers, builder and
//! reranker.
//!
//! - [`ContextItem`] - one retrieved snippet or synthesized relation statement
//! - [`IntentAnalysis`] - structured extraction from a question
//! - [`RetrievalConfig`] - per-call retriever tuning, validated eagerly
//! - [`RetrievalResult`] / [`RerankResult`] - stage outputs
//!
//! All JSON uses camelCase field names.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CodelensError, CodelensResult};

/// Metadata key naming the relation that produced an item.
pub const META_RELATION_TYPE: &str = "relation_type";

/// Metadata key for the file an item belongs to.
pub const META_FILE_PATH: &str = "file_path";

/// Metadata key for the function an item describes.
pub const META_FUNCTION_NAME: &str = "function_name";

// ============================================================================
// SourceType
// ============================================================================

/// The backing store an item was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Vector,
    CallGraph,
    Dependency,
}

impl SourceType {
    /// All sources in merge priority order.
    pub const PRIORITY: [SourceType; 3] = [
        SourceType::CallGraph,
        SourceType::Vector,
        SourceType::Dependency,
    ];

    /// Position in the merge order; lower merges first.
    pub fn priority(&self) -> usize {
        match self {
            SourceType::CallGraph => 0,
            SourceType::Vector => 1,
            SourceType::Dependency => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Vector => "vector",
            SourceType::CallGraph => "call_graph",
            SourceType::Dependency => "dependency",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "vector" | "semantic" => Ok(SourceType::Vector),
            "call_graph" | "callgraph" => Ok(SourceType::CallGraph),
            "dependency" | "dependencies" => Ok(SourceType::Dependency),
            _ => Err(format!(
                "Unknown source: '{}'. Use 'vector', 'call_graph', or 'dependency'.",
                s
            )),
        }
    }
}

// ============================================================================
// ContextItem
// ============================================================================

/// One retrieved unit of text.
///
/// Immutable once built: the score is validated in [`ContextItem::new`] and
/// again on deserialization, and nothing exposes `&mut` access afterwards.
/// Metadata keeps insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawContextItem")]
pub struct ContextItem {
    content: String,
    source_type: SourceType,
    relevance_score: f64,
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContextItem {
    content: String,
    source_type: SourceType,
    relevance_score: f64,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl TryFrom<RawContextItem> for ContextItem {
    type Error = CodelensError;

    fn try_from(raw: RawContextItem) -> Result<Self, Self::Error> {
        let mut item = ContextItem::new(raw.content, raw.source_type, raw.relevance_score)?;
        item.metadata = raw.metadata;
        Ok(item)
    }
}

impl ContextItem {
    /// Create an item.
    ///
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidRelevanceScore`] if `relevance_score` is
    /// NaN or outside `[0.0, 1.0]`.
    pub fn new(
        content: impl Into<String>,
        source_type: SourceType,
        relevance_score: f64,
    ) -> CodelensResult<Self> {
        if !(0.0..=1.0).contains(&relevance_score) {
            return Err(CodelensError::InvalidRelevanceScore {
                score: relevance_score,
            });
        }

        Ok(Self {
            content: content.into(),
            source_type,
            relevance_score,
            metadata: Map::new(),
        })
    }

    /// Add one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add every entry of `metadata`, keeping its order.
    pub fn with_metadata_map(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// A string metadata value.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Remove items whose `content` was already seen, keeping first occurrences.
pub fn deduplicate_by_content(items: Vec<ContextItem>) -> Vec<ContextItem> {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.content.clone()))
        .collect()
}

/// Stable sort by relevance score, highest first. Ties keep their order.
pub fn sort_by_score_desc(items: &mut [ContextItem]) {
    items.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ============================================================================
// IntentAnalysis
// ============================================================================

/// Kind of a named entity in a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    File,
    Concept,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Function => write!(f, "function"),
            EntityKind::File => write!(f, "file"),
            EntityKind::Concept => write!(f, "concept"),
        }
    }
}

/// A named entity mentioned in a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Category of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    FunctionQuery,
    FileQuery,
    ConceptQuery,
    CallRelationship,
    DependencyQuery,
    #[default]
    GeneralQuestion,
}

impl IntentType {
    /// Map a free-form label (as produced by an LLM) to an intent.
    ///
    /// Accepts both the canonical names and the task-style labels the
    /// analysis prompt suggests. Returns `None` for anything unrecognized.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        let intent = match normalized.as_str() {
            "function_query" | "function_analysis" | "function" => IntentType::FunctionQuery,
            "file_query" | "file_analysis" | "file" => IntentType::FileQuery,
            "concept_query" | "concept" | "concept_explanation" => IntentType::ConceptQuery,
            "call_relationship" | "call_graph" | "find_callers" | "find_callees" => {
                IntentType::CallRelationship
            }
            "dependency_query" | "dependency_analysis" | "find_dependencies" | "dependency" => {
                IntentType::DependencyQuery
            }
            "general_question" | "general" => IntentType::GeneralQuestion,
            _ => return None,
        };
        Some(intent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::FunctionQuery => "FUNCTION_QUERY",
            IntentType::FileQuery => "FILE_QUERY",
            IntentType::ConceptQuery => "CONCEPT_QUERY",
            IntentType::CallRelationship => "CALL_RELATIONSHIP",
            IntentType::DependencyQuery => "DEPENDENCY_QUERY",
            IntentType::GeneralQuestion => "GENERAL_QUESTION",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured extraction from a question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentAnalysis {
    /// Named entities, deduplicated, in discovery order.
    pub entities: Vec<Entity>,

    pub intent_type: IntentType,

    pub keywords: BTreeSet<String>,

    /// Variable names mentioned in the question.
    #[serde(default)]
    pub variables: BTreeSet<String>,

    /// Terms suggested for searching the stores.
    #[serde(default)]
    pub search_terms: BTreeSet<String>,

    pub confidence: f64,
}

impl IntentAnalysis {
    /// Add an entity unless an identical one is present.
    pub fn add_entity(&mut self, name: impl Into<String>, kind: EntityKind) {
        let entity = Entity::new(name, kind);
        if !entity.name.is_empty() && !self.entities.contains(&entity) {
            self.entities.push(entity);
        }
    }

    /// Names of entities of the given kind, in order.
    pub fn entity_names(&self, kind: EntityKind) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| e.name.as_str())
    }

    pub fn functions(&self) -> Vec<&str> {
        self.entity_names(EntityKind::Function).collect()
    }

    pub fn files(&self) -> Vec<&str> {
        self.entity_names(EntityKind::File).collect()
    }

    /// True when the question names at least one function or file.
    pub fn has_code_entities(&self) -> bool {
        self.entities
            .iter()
            .any(|e| matches!(e.kind, EntityKind::Function | EntityKind::File))
    }
}

// ============================================================================
// RetrievalConfig
// ============================================================================

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 30.0;
/// Upper bound for `timeoutSeconds` (one hour).
pub const MAX_TIMEOUT_SECONDS: f64 = 3600.0;

/// Per-call retriever tuning.
///
/// Validated eagerly: invalid values fail construction rather than being
/// clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    top_k: usize,
    enable_parallel: bool,
    timeout: Duration,
    min_relevance_score: f64,
}

impl RetrievalConfig {
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidConfiguration`] if `top_k` is 0,
    /// `timeout_seconds` is not within `(0, MAX_TIMEOUT_SECONDS]`, or
    /// `min_relevance_score` is outside `[0, 1]`.
    pub fn new(
        top_k: usize,
        enable_parallel: bool,
        timeout_seconds: f64,
        min_relevance_score: f64,
    ) -> CodelensResult<Self> {
        if top_k == 0 {
            return Err(CodelensError::invalid_configuration(
                "topK cannot be 0",
                "Set topK to at least 1",
            ));
        }
        if !(timeout_seconds > 0.0 && timeout_seconds <= MAX_TIMEOUT_SECONDS) {
            return Err(invalid_timeout(timeout_seconds));
        }
        let timeout =
            Duration::try_from_secs_f64(timeout_seconds).map_err(|_| invalid_timeout(timeout_seconds))?;
        if !(0.0..=1.0).contains(&min_relevance_score) {
            return Err(CodelensError::invalid_configuration(
                format!(
                    "minRelevanceScore must be within [0, 1] (got {})",
                    min_relevance_score
                ),
                "Use a score threshold between 0.0 and 1.0",
            ));
        }

        Ok(Self {
            top_k,
            enable_parallel,
            timeout,
            min_relevance_score,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn enable_parallel(&self) -> bool {
        self.enable_parallel
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn min_relevance_score(&self) -> f64 {
        self.min_relevance_score
    }

    /// Copy with a different `top_k`.
    pub fn with_top_k(self, top_k: usize) -> CodelensResult<Self> {
        Self::new(
            top_k,
            self.enable_parallel,
            self.timeout.as_secs_f64(),
            self.min_relevance_score,
        )
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            enable_parallel: true,
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS),
            min_relevance_score: 0.0,
        }
    }
}

fn invalid_timeout(timeout_seconds: f64) -> CodelensError {
    CodelensError::invalid_configuration(
        format!(
            "timeoutSeconds must be within (0, {}] (got {})",
            MAX_TIMEOUT_SECONDS, timeout_seconds
        ),
        "Set timeoutSeconds to a positive number of seconds, at most one hour",
    )
}

// ============================================================================
// RetrievalResult
// ============================================================================

/// Output of one retriever.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub items: Vec<ContextItem>,
    pub source_type: SourceType,
    pub query_time: Duration,
    /// Candidates seen before truncation.
    pub total_candidates: usize,
}

impl RetrievalResult {
    pub fn new(source_type: SourceType, items: Vec<ContextItem>, query_time: Duration) -> Self {
        let total_candidates = items.len();
        Self {
            items,
            source_type,
            query_time,
            total_candidates,
        }
    }

    /// The result of a failed or skipped retrieval.
    pub fn empty(source_type: SourceType) -> Self {
        Self::new(source_type, Vec::new(), Duration::ZERO)
    }

    /// Items scoring at least `min_score`.
    pub fn filter_by_score(&self, min_score: f64) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|i| i.relevance_score() >= min_score)
                .cloned()
                .collect(),
            ..self.clone_meta()
        }
    }

    /// The first `k` items.
    pub fn top_k(&self, k: usize) -> Self {
        Self {
            items: self.items.iter().take(k).cloned().collect(),
            ..self.clone_meta()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn clone_meta(&self) -> Self {
        Self {
            items: Vec::new(),
            source_type: self.source_type,
            query_time: self.query_time,
            total_candidates: self.total_candidates,
        }
    }
}

// ============================================================================
// RerankResult
// ============================================================================

/// Output of the reranker.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    pub items: Vec<ContextItem>,
    pub rerank_time: Duration,
    pub original_count: usize,
    /// 1.0 when no reordering was needed, 0.0 after a fallback.
    pub confidence: f64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(content: &str, score: f64) -> ContextItem {
        ContextItem::new(content, SourceType::Vector, score).unwrap()
    }

    #[test]
    fn test_score_bounds_are_enforced() {
        assert!(ContextItem::new("a", SourceType::Vector, 0.0).is_ok());
        assert!(ContextItem::new("a", SourceType::Vector, 1.0).is_ok());

        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ContextItem::new("a", SourceType::Vector, bad),
                Err(CodelensError::InvalidRelevanceScore { .. })
            ));
        }
    }

    #[test]
    fn test_deserialization_validates_score() {
        let ok: ContextItem = serde_json::from_str(
            r#"{"content":"x","sourceType":"call_graph","relevanceScore":0.8,"metadata":{"b":1,"a":2}}"#,
        )
        .unwrap();
        assert_eq!(ok.source_type(), SourceType::CallGraph);
        // insertion order survives
        let keys: Vec<&String> = ok.metadata().keys().collect();
        assert_eq!(keys, ["b", "a"]);

        let bad = serde_json::from_str::<ContextItem>(
            r#"{"content":"x","sourceType":"vector","relevanceScore":1.5}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_dedup_keeps_first_and_is_idempotent() {
        let items = vec![
            ContextItem::new("same", SourceType::CallGraph, 1.0).unwrap(),
            item("other", 0.5),
            item("same", 0.9),
        ];
        let once = deduplicate_by_content(items);
        assert_eq!(once.len(), 2);
        assert_eq!(once[0].source_type(), SourceType::CallGraph);

        let twice = deduplicate_by_content(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut items = vec![item("a", 0.5), item("b", 0.9), item("c", 0.5)];
        sort_by_score_desc(&mut items);
        let order: Vec<&str> = items.iter().map(|i| i.content()).collect();
        assert_eq!(order, ["b", "a", "c"]);
    }

    #[test]
    fn test_intent_type_labels() {
        assert_eq!(
            IntentType::from_label("function_analysis"),
            Some(IntentType::FunctionQuery)
        );
        assert_eq!(
            IntentType::from_label("CALL_RELATIONSHIP"),
            Some(IntentType::CallRelationship)
        );
        assert_eq!(IntentType::from_label("mystery"), None);
        assert_eq!(IntentType::default(), IntentType::GeneralQuestion);
    }

    #[test]
    fn test_add_entity_deduplicates() {
        let mut intent = IntentAnalysis::default();
        intent.add_entity("sbi_init", EntityKind::Function);
        intent.add_entity("sbi_init", EntityKind::Function);
        intent.add_entity("sbi_init.c", EntityKind::File);
        intent.add_entity("", EntityKind::Concept);

        assert_eq!(intent.entities.len(), 2);
        assert_eq!(intent.functions(), ["sbi_init"]);
        assert_eq!(intent.files(), ["sbi_init.c"]);
        assert!(intent.has_code_entities());
    }

    #[test]
    fn test_retrieval_config_validation() {
        assert!(RetrievalConfig::new(5, true, 10.0, 0.5).is_ok());
        assert!(RetrievalConfig::new(0, true, 10.0, 0.5).is_err());
        assert!(RetrievalConfig::new(5, true, 0.0, 0.5).is_err());
        assert!(RetrievalConfig::new(5, true, -1.0, 0.5).is_err());
        assert!(RetrievalConfig::new(5, true, f64::NAN, 0.5).is_err());
        assert!(RetrievalConfig::new(5, true, f64::INFINITY, 0.5).is_err());
        assert!(RetrievalConfig::new(5, true, 1e19, 0.5).is_err());
        assert!(RetrievalConfig::new(5, true, 1e20, 0.5).is_err());
        assert!(RetrievalConfig::new(5, true, MAX_TIMEOUT_SECONDS, 0.5).is_ok());
        assert!(RetrievalConfig::new(5, true, MAX_TIMEOUT_SECONDS + 1.0, 0.5).is_err());
        assert!(RetrievalConfig::new(5, true, 10.0, 1.5).is_err());
        assert!(RetrievalConfig::new(5, true, 10.0, -0.1).is_err());
    }

    #[test]
    fn test_retrieval_result_transforms_are_pure() {
        let result = RetrievalResult::new(
            SourceType::Vector,
            vec![item("a", 0.9), item("b", 0.4), item("c", 0.7)],
            Duration::from_millis(5),
        );

        let filtered = result.filter_by_score(0.5);
        assert_eq!(filtered.items.len(), 2);
        assert_eq!(filtered.total_candidates, 3);

        let top = result.top_k(1);
        assert_eq!(top.items.len(), 1);
        assert_eq!(top.items[0].content(), "a");

        assert_eq!(result.items.len(), 3);
    }
}
