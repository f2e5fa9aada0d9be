//! Intent analysis: question text → [`IntentAnalysis`].
//!
//! Two extractors run on every question:
//!
//! 1. **LLM**: a prompt asking for a JSON object with `functions`, `files`,
//!    `variables`, `keywords`, `intent_type` and `search_terms`.
//! 2. **Patterns**: regexes for C identifiers and file names, a technical
//!    vocabulary scan and verb cues for the intent type.
//!
//! List fields are unioned; the LLM's intent type wins when it gave one.
//! [`IntentAnalyzer::analyze`] never fails: a dead or confused model leaves
//! the pattern result on its own.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use codelens_model::{ChatMessage, ChatModel};

use crate::config::IntentConfig;
use crate::constants::{CALL_CUES, STOP_WORDS};
use crate::context::{EntityKind, IntentAnalysis, IntentType};
use crate::llm_output::{extract_delimited, strip_code_fence};

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\b").expect("valid regex"));

static FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z_][A-Za-z0-9_./-]*\.(?:c|h|cc|cpp|hh|hpp)\b").expect("valid regex")
});

static CALL_SYNTAX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex"));

static CAMEL_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*[A-Z]").expect("valid regex"));

/// Maximum fallback search terms taken from plain words.
const MAX_FALLBACK_TERMS: usize = 5;

// Confidence by extraction path
const CONFIDENCE_LLM_COMPLETE: f64 = 0.9;
const CONFIDENCE_LLM_PARTIAL: f64 = 0.7;
const CONFIDENCE_PATTERNS: f64 = 0.5;
const CONFIDENCE_NOTHING_FOUND: f64 = 0.3;

const SYSTEM_PROMPT: &str = "You analyze questions about a C codebase. \
You reply with a single JSON object and nothing else.";

/// Fields requested from the model.
const LLM_FIELDS: [&str; 6] = [
    "functions",
    "files",
    "variables",
    "keywords",
    "intent_type",
    "search_terms",
];

// ============================================================================
// IntentAnalyzer
// ============================================================================

/// Turns free-text questions into structured intents.
#[derive(Debug, Clone)]
pub struct IntentAnalyzer {
    chat: Option<Arc<dyn ChatModel>>,
    config: IntentConfig,
    vocabulary: HashSet<String>,
}

impl IntentAnalyzer {
    /// Create an analyzer. Without a chat model only patterns are used.
    pub fn new(chat: Option<Arc<dyn ChatModel>>, config: IntentConfig) -> Self {
        let vocabulary = config
            .technical_terms
            .iter()
            .map(|t| t.to_lowercase())
            .collect();
        Self {
            chat,
            config,
            vocabulary,
        }
    }

    /// Analyze a question.
    pub fn analyze(&self, question: &str) -> IntentAnalysis {
        let patterns = self.extract_with_patterns(question);

        let llm = match &self.chat {
            Some(chat) if self.config.use_llm => self.extract_with_llm(chat.as_ref(), question),
            _ => None,
        };

        let merged = self.merge(llm.as_ref(), patterns);
        debug!(
            intent = %merged.intent_type,
            entities = merged.entities.len(),
            keywords = merged.keywords.len(),
            confidence = merged.confidence,
            "Intent analyzed"
        );
        merged
    }

    // ------------------------------------------------------------------------
    // LLM path
    // ------------------------------------------------------------------------

    fn extract_with_llm(&self, chat: &dyn ChatModel, question: &str) -> Option<LlmIntent> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(question)),
        ];

        let reply = match chat.chat(&messages) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Intent LLM call failed, using pattern extraction: {}", e);
                return None;
            }
        };

        let parsed = parse_llm_response(&reply);
        if parsed.is_none() {
            warn!("Intent LLM reply was not a JSON object, using pattern extraction");
        }
        parsed
    }

    // ------------------------------------------------------------------------
    // Pattern path
    // ------------------------------------------------------------------------

    /// Deterministic extraction used on its own when the LLM is unavailable.
    pub fn extract_with_patterns(&self, question: &str) -> IntentAnalysis {
        let mut intent = IntentAnalysis::default();

        for m in FILE_RE.find_iter(question) {
            intent.add_entity(m.as_str(), EntityKind::File);
        }

        // File names would otherwise split into identifier-like tokens.
        let without_files = FILE_RE.replace_all(question, " ");

        let called: HashSet<&str> = CALL_SYNTAX_RE
            .captures_iter(&without_files)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        for token in IDENT_RE.find_iter(&without_files).map(|m| m.as_str()) {
            if is_function_candidate(token, called.contains(token)) {
                intent.add_entity(token, EntityKind::Function);
            }
        }

        let words: Vec<String> = IDENT_RE
            .find_iter(question)
            .map(|m| m.as_str().to_lowercase())
            .collect();

        for word in &words {
            if self.vocabulary.contains(word) {
                intent.keywords.insert(word.clone());
            }
        }

        intent.intent_type = if words.iter().any(|w| CALL_CUES.contains(&w.as_str())) {
            IntentType::CallRelationship
        } else if !intent.functions().is_empty() {
            IntentType::FunctionQuery
        } else if !intent.files().is_empty() {
            IntentType::FileQuery
        } else {
            IntentType::GeneralQuestion
        };

        let mut terms: BTreeSet<String> = intent
            .functions()
            .into_iter()
            .map(str::to_string)
            .chain(intent.keywords.iter().cloned())
            .collect();
        if terms.is_empty() {
            terms = words
                .iter()
                .filter(|w| w.len() >= 3 && w.chars().all(|c| c.is_ascii_alphabetic()))
                .filter(|w| !STOP_WORDS.contains(&w.as_str()))
                .take(MAX_FALLBACK_TERMS)
                .cloned()
                .collect();
        }
        intent.search_terms = terms;

        intent.confidence = if intent.has_code_entities() || !intent.keywords.is_empty() {
            CONFIDENCE_PATTERNS
        } else {
            CONFIDENCE_NOTHING_FOUND
        };
        intent
    }

    // ------------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------------

    /// Union the LLM result (if any) with the pattern result.
    fn merge(&self, llm: Option<&LlmIntent>, patterns: IntentAnalysis) -> IntentAnalysis {
        let Some(llm) = llm else {
            let mut only = patterns;
            self.add_concepts(&mut only);
            return only;
        };

        let mut merged = IntentAnalysis::default();

        for name in &llm.functions {
            merged.add_entity(name.as_str(), EntityKind::Function);
        }
        for name in patterns.functions() {
            merged.add_entity(name, EntityKind::Function);
        }
        for name in &llm.files {
            merged.add_entity(name.as_str(), EntityKind::File);
        }
        for name in patterns.files() {
            merged.add_entity(name, EntityKind::File);
        }

        merged.variables = patterns.variables;
        merged.variables.extend(llm.variables.iter().cloned());

        merged.keywords = patterns.keywords;
        merged
            .keywords
            .extend(llm.keywords.iter().map(|k| k.to_lowercase()));

        merged.search_terms = patterns.search_terms;
        merged.search_terms.extend(llm.search_terms.iter().cloned());

        merged.intent_type = llm.intent_type.unwrap_or(patterns.intent_type);
        merged.confidence = if llm.complete {
            CONFIDENCE_LLM_COMPLETE
        } else {
            CONFIDENCE_LLM_PARTIAL
        };

        self.add_concepts(&mut merged);
        merged
    }

    /// Keywords from the technical vocabulary become concept entities.
    fn add_concepts(&self, intent: &mut IntentAnalysis) {
        let concepts: Vec<String> = intent
            .keywords
            .iter()
            .filter(|k| self.vocabulary.contains(k.as_str()))
            .cloned()
            .collect();
        for concept in concepts {
            intent.add_entity(concept, EntityKind::Concept);
        }
    }
}

/// Token filter for candidate function names.
fn is_function_candidate(token: &str, followed_by_paren: bool) -> bool {
    if STOP_WORDS.contains(&token.to_lowercase().as_str()) {
        return false;
    }

    let has_inner_underscore = token.contains('_') && token.chars().any(|c| c.is_ascii_alphanumeric());
    has_inner_underscore || CAMEL_CASE_RE.is_match(token) || followed_by_paren
}

// ============================================================================
// LLM prompt and response
// ============================================================================

fn build_prompt(question: &str) -> String {
    format!(
        "Analyze this question about a C codebase and extract structured information.\n\n\
         Question: {question}\n\n\
         Respond with a JSON object containing:\n\
         - \"functions\": function names mentioned or clearly implied\n\
         - \"files\": source or header file names mentioned (e.g. \"sbi_init.c\")\n\
         - \"variables\": variable, struct or macro names mentioned\n\
         - \"keywords\": important technical keywords\n\
         - \"intent_type\": one of \"function_analysis\", \"file_analysis\", \"concept_query\", \
         \"call_relationship\", \"dependency_analysis\", \"general_question\"\n\
         - \"search_terms\": terms useful for searching the code\n\n\
         Use empty arrays for fields with nothing to report. Return only the JSON object."
    )
}

/// Fields decoded from an LLM reply, each defaulted independently.
#[derive(Debug, Default, PartialEq)]
struct LlmIntent {
    functions: Vec<String>,
    files: Vec<String>,
    variables: Vec<String>,
    keywords: Vec<String>,
    search_terms: Vec<String>,
    intent_type: Option<IntentType>,
    /// Every requested field was present and well-formed.
    complete: bool,
}

/// Decode an LLM reply. `None` when no JSON object can be found at all.
fn parse_llm_response(reply: &str) -> Option<LlmIntent> {
    let text = strip_code_fence(reply);
    let value: Value = serde_json::from_str(text).ok().or_else(|| {
        extract_delimited(text, '{', '}').and_then(|inner| serde_json::from_str(inner).ok())
    })?;
    let object = value.as_object()?;

    let mut well_formed = 0;
    let mut list = |key: &str| -> Vec<String> {
        match object.get(key) {
            Some(Value::Array(values)) => {
                well_formed += 1;
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            Some(Value::String(single)) if !single.trim().is_empty() => {
                vec![single.trim().to_string()]
            }
            _ => Vec::new(),
        }
    };

    let functions = list("functions");
    let files = list("files");
    let variables = list("variables");
    let keywords = list("keywords");
    let search_terms = list("search_terms");

    let intent_type = object
        .get("intent_type")
        .and_then(Value::as_str)
        .and_then(IntentType::from_label);
    if intent_type.is_some() {
        well_formed += 1;
    }

    Some(LlmIntent {
        functions,
        files,
        variables,
        keywords,
        search_terms,
        intent_type,
        complete: well_formed == LLM_FIELDS.len(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use codelens_model::{ModelError, ModelResult};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct ScriptedChat {
        reply: Result<String, String>,
        calls: Mutex<usize>,
    }

    impl ScriptedChat {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("connection refused".to_string()),
                calls: Mutex::new(0),
            })
        }
    }

    impl ChatModel for ScriptedChat {
        fn chat(&self, _messages: &[ChatMessage]) -> ModelResult<String> {
            *self.calls.lock().unwrap() += 1;
            self.reply
                .clone()
                .map_err(|m| ModelError::request("scripted", m))
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    fn patterns_only() -> IntentAnalyzer {
        IntentAnalyzer::new(None, IntentConfig::default())
    }

    fn names(intent: &IntentAnalysis, kind: EntityKind) -> BTreeSet<String> {
        intent.entity_names(kind).map(str::to_string).collect()
    }

    #[test]
    fn test_patterns_call_relationship() {
        let intent = patterns_only().analyze("what calls sbi_init?");
        assert_eq!(intent.intent_type, IntentType::CallRelationship);
        assert_eq!(intent.functions(), ["sbi_init"]);
        assert!(intent.search_terms.contains("sbi_init"));
    }

    #[test]
    fn test_patterns_function_and_file_queries() {
        let analyzer = patterns_only();

        let intent = analyzer.analyze("What does sbi_hart_init do?");
        assert_eq!(intent.intent_type, IntentType::FunctionQuery);

        let intent = analyzer.analyze("Explain lib/sbi/sbi_init.c");
        assert_eq!(intent.intent_type, IntentType::FileQuery);
        assert_eq!(intent.files(), ["lib/sbi/sbi_init.c"]);
        // the file name must not leak into function candidates
        assert!(intent.functions().is_empty());
    }

    #[test]
    fn test_patterns_camel_case_and_call_syntax() {
        let intent = patterns_only().analyze("how is initPlatform used and what about probe()");
        let functions = names(&intent, EntityKind::Function);
        assert!(functions.contains("initPlatform"));
        assert!(functions.contains("probe"));
    }

    #[test]
    fn test_patterns_keywords_and_concepts() {
        let intent = patterns_only().analyze("How does interrupt handler registration work?");
        assert!(intent.keywords.contains("interrupt"));
        assert!(intent.keywords.contains("handler"));
        assert!(names(&intent, EntityKind::Concept).contains("interrupt"));
        assert_eq!(intent.intent_type, IntentType::GeneralQuestion);
    }

    #[test]
    fn test_patterns_fallback_search_terms() {
        let intent = patterns_only().analyze("Where is the console output written?");
        let expected: BTreeSet<String> = ["console", "output", "written"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(intent.search_terms, expected);
        assert_eq!(intent.confidence, CONFIDENCE_NOTHING_FOUND);
    }

    #[test]
    fn test_stop_words_are_not_functions() {
        let intent = patterns_only().analyze("What function does Which call?");
        assert!(intent.functions().is_empty());
    }

    #[test]
    fn test_merge_unions_function_sets() {
        let chat = ScriptedChat::replying(
            r#"{"functions": ["foo"], "files": [], "variables": [], "keywords": [],
                "intent_type": "function_analysis", "search_terms": ["foo"]}"#,
        );
        let analyzer = IntentAnalyzer::new(Some(chat), IntentConfig::default());

        let intent = analyzer.analyze("compare foo with bar_baz");
        let expected: BTreeSet<String> = ["foo", "bar_baz"].into_iter().map(str::to_string).collect();
        assert_eq!(names(&intent, EntityKind::Function), expected);
        assert_eq!(intent.intent_type, IntentType::FunctionQuery);
        assert_eq!(intent.confidence, CONFIDENCE_LLM_COMPLETE);
    }

    #[test]
    fn test_llm_intent_type_wins_over_patterns() {
        let chat = ScriptedChat::replying(
            "```json\n{\"functions\": [\"sbi_init\"], \"intent_type\": \"dependency_analysis\"}\n```",
        );
        let analyzer = IntentAnalyzer::new(Some(chat), IntentConfig::default());

        let intent = analyzer.analyze("what calls sbi_init?");
        assert_eq!(intent.intent_type, IntentType::DependencyQuery);
        assert_eq!(intent.confidence, CONFIDENCE_LLM_PARTIAL);
    }

    #[test]
    fn test_unknown_llm_intent_keeps_pattern_intent() {
        let chat = ScriptedChat::replying(r#"{"intent_type": "poetry"}"#);
        let analyzer = IntentAnalyzer::new(Some(chat), IntentConfig::default());

        let intent = analyzer.analyze("what calls sbi_init?");
        assert_eq!(intent.intent_type, IntentType::CallRelationship);
    }

    #[test]
    fn test_llm_failure_falls_back_to_patterns() {
        let chat = ScriptedChat::failing();
        let analyzer = IntentAnalyzer::new(Some(chat.clone()), IntentConfig::default());

        let intent = analyzer.analyze("what calls sbi_init?");
        assert_eq!(*chat.calls.lock().unwrap(), 1);
        assert_eq!(intent.functions(), ["sbi_init"]);
        assert_eq!(intent.confidence, CONFIDENCE_PATTERNS);
    }

    #[test]
    fn test_garbage_reply_falls_back_to_patterns() {
        let chat = ScriptedChat::replying("I think it's about booting.");
        let analyzer = IntentAnalyzer::new(Some(chat), IntentConfig::default());
        let intent = analyzer.analyze("what calls sbi_init?");
        assert_eq!(intent.intent_type, IntentType::CallRelationship);
    }

    #[test]
    fn test_disabled_llm_is_not_called() {
        let chat = ScriptedChat::replying("{}");
        let config = IntentConfig {
            use_llm: false,
            ..IntentConfig::default()
        };
        let analyzer = IntentAnalyzer::new(Some(chat.clone()), config);
        analyzer.analyze("what calls sbi_init?");
        assert_eq!(*chat.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_parse_defaults_per_field() {
        let parsed = parse_llm_response(
            r#"Sure! {"functions": "sbi_init", "files": 7, "keywords": ["boot", 3, ""]}"#,
        )
        .unwrap();
        assert_eq!(parsed.functions, ["sbi_init"]);
        assert!(parsed.files.is_empty());
        assert_eq!(parsed.keywords, ["boot"]);
        assert_eq!(parsed.intent_type, None);
        assert!(!parsed.complete);

        assert_eq!(parse_llm_response("[1, 2, 3]"), None);
        assert_eq!(parse_llm_response("no json"), None);
    }
}
