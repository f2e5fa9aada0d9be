//! Dependency retriever: include relationships between source files.

use std::sync::Arc;
use std::time::Instant;

use codelens_db::graph::{GraphStore, IncludeRecord};
use tracing::debug;

use super::{finish_retrieval, ContextRetriever};
use crate::config::ScoringConfig;
use crate::constants::DEPENDENCY_CUES;
use crate::context::{
    sort_by_score_desc, ContextItem, IntentAnalysis, RetrievalConfig, RetrievalResult,
    SourceType, META_FILE_PATH, META_RELATION_TYPE,
};
use crate::errors::CodelensResult;

/// Retrieves include relationships as readable text blocks.
///
/// Files come from the intent's file entities, or else from the files that
/// define its function entities. With neither, and only when the question talks
/// about includes or headers, the project's most included headers are returned.
pub struct DependencyRetriever {
    graph: Arc<dyn GraphStore>,
    scoring: ScoringConfig,
}

impl DependencyRetriever {
    pub fn new(graph: Arc<dyn GraphStore>, scoring: ScoringConfig) -> Self {
        Self { graph, scoring }
    }

    fn try_retrieve(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        config: &RetrievalConfig,
    ) -> CodelensResult<Vec<ContextItem>> {
        let files = self.target_files(intent)?;

        let mut items = Vec::new();
        if !files.is_empty() {
            for file in &files {
                items.extend(self.file_context(file)?);
            }
        } else if mentions_dependencies(query, intent) {
            items.extend(self.top_headers(config.top_k())?);
        } else {
            debug!("No file context and no dependency cues; skipping");
        }

        sort_by_score_desc(&mut items);
        Ok(items)
    }

    /// File entities, or the defining files of function entities.
    fn target_files(&self, intent: &IntentAnalysis) -> CodelensResult<Vec<String>> {
        let mut files: Vec<String> = intent.files().into_iter().map(str::to_string).collect();
        if !files.is_empty() {
            return Ok(files);
        }

        for name in intent.functions() {
            if let Some(def) = self.graph.query_function_by_name(name)? {
                if !files.contains(&def.file_path) {
                    files.push(def.file_path);
                }
            }
        }
        Ok(files)
    }

    fn file_context(&self, file: &str) -> CodelensResult<Vec<ContextItem>> {
        let mut items = Vec::new();

        let includes = self.graph.query_file_includes(file)?;
        if !includes.is_empty() {
            let content = relation_block(
                &format!("File {} includes:", file),
                includes.iter().map(|inc| inc.target.as_str()),
            );
            items.push(
                ContextItem::new(content, SourceType::Dependency, self.scoring.includes)?
                    .with_metadata(META_RELATION_TYPE, "includes")
                    .with_metadata(META_FILE_PATH, file)
                    .with_metadata("include_count", includes.len())
                    .with_metadata("system_include_count", count_system(&includes)),
            );
        }

        let included_by = self.graph.query_file_included_by(file)?;
        if !included_by.is_empty() {
            let content = relation_block(
                &format!("File {} is included by:", file),
                included_by.iter().map(|inc| inc.source.as_str()),
            );
            items.push(
                ContextItem::new(content, SourceType::Dependency, self.scoring.included_by)?
                    .with_metadata(META_RELATION_TYPE, "included_by")
                    .with_metadata(META_FILE_PATH, file)
                    .with_metadata("included_by_count", included_by.len()),
            );
        }

        debug!(
            "Dependencies of '{}': {} includes, {} included by",
            file,
            includes.len(),
            included_by.len()
        );
        Ok(items)
    }

    fn top_headers(&self, limit: usize) -> CodelensResult<Option<ContextItem>> {
        let headers = self.graph.query_top_included_files(limit)?;
        if headers.is_empty() {
            return Ok(None);
        }

        let mut content = String::from("Most included headers in the project:");
        for header in &headers {
            content.push_str(&format!(
                "\n- {}: included {} times",
                header.path, header.include_count
            ));
        }

        let item = ContextItem::new(content, SourceType::Dependency, self.scoring.top_headers)?
            .with_metadata(META_RELATION_TYPE, "top_headers")
            .with_metadata("header_count", headers.len());
        Ok(Some(item))
    }
}

impl ContextRetriever for DependencyRetriever {
    fn retrieve(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        config: &RetrievalConfig,
    ) -> RetrievalResult {
        let started = Instant::now();
        let candidates = self.try_retrieve(query, intent, config);
        finish_retrieval(SourceType::Dependency, started, candidates, config)
    }

    fn is_available(&self) -> bool {
        self.graph.is_available()
    }

    fn source_type(&self) -> SourceType {
        SourceType::Dependency
    }
}

fn relation_block<'a>(heading: &str, paths: impl Iterator<Item = &'a str>) -> String {
    let mut block = heading.to_string();
    for path in paths {
        block.push_str("\n- ");
        block.push_str(path);
    }
    block
}

fn count_system(includes: &[IncludeRecord]) -> usize {
    includes.iter().filter(|inc| inc.system).count()
}

/// True when the question or its keywords use include/header vocabulary.
fn mentions_dependencies(query: &str, intent: &IntentAnalysis) -> bool {
    let query = query.to_lowercase();
    DEPENDENCY_CUES.iter().any(|cue| {
        query.contains(cue)
            || intent
                .keywords
                .iter()
                .any(|kw| kw.to_lowercase().contains(cue))
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EntityKind;
    use crate::retriever::test_support::BrokenGraph;
    use codelens_db::graph::{FunctionRecord, JsonlGraphStore};

    fn include_graph() -> Arc<dyn GraphStore> {
        let mut stdint = IncludeRecord::new("lib/sbi/sbi_init.c", "stdint.h");
        stdint.system = true;
        Arc::new(JsonlGraphStore::from_records(
            vec![FunctionRecord::new("sbi_init", "lib/sbi/sbi_init.c")],
            vec![],
            vec![
                IncludeRecord::new("lib/sbi/sbi_init.c", "include/sbi/sbi_console.h"),
                stdint,
                IncludeRecord::new("lib/sbi/sbi_console.c", "include/sbi/sbi_console.h"),
                IncludeRecord::new("lib/sbi/sbi_hart.c", "include/sbi/sbi_hart.h"),
            ],
        ))
    }

    fn retriever() -> DependencyRetriever {
        DependencyRetriever::new(include_graph(), ScoringConfig::default())
    }

    #[test]
    fn test_file_entity_blocks() {
        let mut intent = IntentAnalysis::default();
        intent.add_entity("sbi_console.h", EntityKind::File);

        let result = retriever().retrieve("who uses sbi_console.h?", &intent, &RetrievalConfig::default());

        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.metadata_str(META_RELATION_TYPE), Some("included_by"));
        assert_eq!(item.relevance_score(), 0.7);
        assert_eq!(
            item.content(),
            "File sbi_console.h is included by:\n- lib/sbi/sbi_init.c\n- lib/sbi/sbi_console.c"
        );
    }

    #[test]
    fn test_function_entity_resolves_file() {
        let mut intent = IntentAnalysis::default();
        intent.add_entity("sbi_init", EntityKind::Function);

        let result = retriever().retrieve("q", &intent, &RetrievalConfig::default());

        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.metadata_str(META_RELATION_TYPE), Some("includes"));
        assert_eq!(item.relevance_score(), 0.8);
        assert!(item.content().starts_with("File lib/sbi/sbi_init.c includes:\n"));
        assert_eq!(item.metadata()["system_include_count"], 1);
    }

    #[test]
    fn test_top_headers_only_with_dependency_cues() {
        let intent = IntentAnalysis::default();

        let quiet = retriever().retrieve("how does booting work?", &intent, &RetrievalConfig::default());
        assert!(quiet.is_empty());

        let result = retriever().retrieve(
            "which headers matter most?",
            &intent,
            &RetrievalConfig::default(),
        );
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].relevance_score(), 0.6);
        assert_eq!(
            result.items[0].content(),
            "Most included headers in the project:\n\
             - include/sbi/sbi_console.h: included 2 times\n\
             - stdint.h: included 1 times\n\
             - include/sbi/sbi_hart.h: included 1 times"
        );
    }

    #[test]
    fn test_store_failure_yields_empty_result() {
        let retriever = DependencyRetriever::new(Arc::new(BrokenGraph), ScoringConfig::default());
        let mut intent = IntentAnalysis::default();
        intent.add_entity("sbi_console.h", EntityKind::File);

        let result = retriever.retrieve("q", &intent, &RetrievalConfig::default());
        assert!(result.is_empty());
    }
}
