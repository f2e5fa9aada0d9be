//! Call-graph retriever: definitions, callers and callees of named functions.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use codelens_db::graph::{FunctionRecord, GraphStore, RelatedFunction};
use tracing::debug;

use super::{finish_retrieval, ContextRetriever};
use crate::config::ScoringConfig;
use crate::context::{
    sort_by_score_desc, ContextItem, IntentAnalysis, RetrievalConfig, RetrievalResult,
    SourceType, META_FILE_PATH, META_FUNCTION_NAME, META_RELATION_TYPE,
};
use crate::errors::CodelensResult;

/// Retrieves structural context from the code graph.
///
/// For every function entity in the intent: its definition, then up to
/// `top_k / 2` callers and `top_k / 2` callees. When the intent names no
/// function, or none of the named functions are known to the graph, falls back
/// to a keyword search over function names and bodies.
pub struct CallGraphRetriever {
    graph: Arc<dyn GraphStore>,
    scoring: ScoringConfig,
}

#[derive(Clone, Copy)]
enum Direction {
    Caller,
    Callee,
}

impl Direction {
    fn relation(self) -> &'static str {
        match self {
            Direction::Caller => "caller",
            Direction::Callee => "callee",
        }
    }
}

impl CallGraphRetriever {
    pub fn new(graph: Arc<dyn GraphStore>, scoring: ScoringConfig) -> Self {
        Self { graph, scoring }
    }

    fn try_retrieve(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        config: &RetrievalConfig,
    ) -> CodelensResult<Vec<ContextItem>> {
        let per_relation = config.top_k() / 2;
        let mut items = Vec::new();

        for name in intent.functions() {
            items.extend(self.function_context(name, per_relation)?);
        }

        if items.is_empty() {
            items = self.keyword_fallback(query, intent)?;
        }

        sort_by_score_desc(&mut items);
        Ok(items)
    }

    fn function_context(&self, name: &str, per_relation: usize) -> CodelensResult<Vec<ContextItem>> {
        let mut items = Vec::new();

        if let Some(def) = self.graph.query_function_by_name(name)? {
            items.push(definition_item(&def, self.scoring.definition, "definition")?);
        } else {
            debug!("Function '{}' not found in graph", name);
        }

        let callers = self.graph.query_callers(name)?;
        for caller in callers.iter().take(per_relation) {
            items.push(related_item(name, caller, Direction::Caller, self.scoring.caller)?);
        }

        let callees = self.graph.query_callees(name)?;
        for callee in callees.iter().take(per_relation) {
            items.push(related_item(name, callee, Direction::Callee, self.scoring.callee)?);
        }

        debug!(
            "Call graph for '{}': {} callers, {} callees",
            name,
            callers.len(),
            callees.len()
        );
        Ok(items)
    }

    fn keyword_fallback(
        &self,
        query: &str,
        intent: &IntentAnalysis,
    ) -> CodelensResult<Vec<ContextItem>> {
        let limit = self.scoring.keyword_hits_per_term;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let keywords: Vec<&str> = if !intent.keywords.is_empty() {
            intent.keywords.iter().map(String::as_str).collect()
        } else if !intent.search_terms.is_empty() {
            intent.search_terms.iter().map(String::as_str).collect()
        } else {
            vec![query.trim()]
        };

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for keyword in keywords.into_iter().filter(|k| !k.is_empty()) {
            for hit in self.graph.search_functions(keyword, limit)? {
                if !seen.insert(hit.name.clone()) {
                    continue;
                }
                items.push(
                    definition_item(&hit, self.scoring.keyword_match, "keyword_match")?
                        .with_metadata("matched_keyword", keyword),
                );
            }
        }

        debug!("Keyword fallback found {} functions", items.len());
        Ok(items)
    }
}

impl ContextRetriever for CallGraphRetriever {
    fn retrieve(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        config: &RetrievalConfig,
    ) -> RetrievalResult {
        let started = Instant::now();
        let candidates = self.try_retrieve(query, intent, config);
        finish_retrieval(SourceType::CallGraph, started, candidates, config)
    }

    fn is_available(&self) -> bool {
        self.graph.is_available()
    }

    fn source_type(&self) -> SourceType {
        SourceType::CallGraph
    }
}

fn definition_item(def: &FunctionRecord, score: f64, relation: &str) -> CodelensResult<ContextItem> {
    let content = format!(
        "// Function: {}\n// File: {}\n{}",
        def.name, def.file_path, def.code
    );

    let mut item = ContextItem::new(content, SourceType::CallGraph, score)?
        .with_metadata(META_RELATION_TYPE, relation)
        .with_metadata(META_FUNCTION_NAME, def.name.as_str())
        .with_metadata(META_FILE_PATH, def.file_path.as_str());
    if let (Some(start), Some(end)) = (def.start_line, def.end_line) {
        item = item
            .with_metadata("start_line", start)
            .with_metadata("end_line", end);
    }
    Ok(item)
}

fn related_item(
    target: &str,
    related: &RelatedFunction,
    direction: Direction,
    score: f64,
) -> CodelensResult<ContextItem> {
    let mut content = match direction {
        Direction::Caller => format!("// {} calls {}\n", related.name, target),
        Direction::Callee => format!("// {} is called by {}\n", related.name, target),
    };
    if let Some(path) = &related.file_path {
        content.push_str(&format!("// File: {}\n", path));
    }
    if let Some(line) = related.call_line {
        content.push_str(&format!("// Call site line: {}\n", line));
    }
    if let Some(code) = &related.code {
        content.push_str(code);
    }

    let mut item = ContextItem::new(content, SourceType::CallGraph, score)?
        .with_metadata(META_RELATION_TYPE, direction.relation())
        .with_metadata(META_FUNCTION_NAME, related.name.as_str())
        .with_metadata("target_function", target);
    if let Some(path) = &related.file_path {
        item = item.with_metadata(META_FILE_PATH, path.as_str());
    }
    Ok(item)
}

// ============================================================================
// Tests
// ============================================================================
