//! LLM-backed reranking of merged context candidates.
//!
//! The reranker asks a chat model to order candidates by relevance and
//! returns at most `top_k` of them. It never fails: when the model is
//! unreachable, keeps answering garbage, or is disabled, candidates are cut by
//! their own relevance score instead.
//!
//! ## Reply format
//!
//! The model must answer with a JSON array of 0-based candidate indices, e.g.
//! `[2, 0, 1]`. A fenced code block around the array is tolerated. Indices
//! that are out of range or repeated are dropped; candidates the model never
//! mentions are appended in their original order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use codelens_model::{ChatMessage, ChatModel, ModelError};

use crate::config::RerankerConfig;
use crate::context::{
    sort_by_score_desc, ContextItem, RerankResult, META_FILE_PATH, META_FUNCTION_NAME,
    META_RELATION_TYPE,
};
use crate::llm_output::{extract_delimited, strip_code_fence};

const SYSTEM_PROMPT: &str =
    "You are an expert code analyst helping to rank code contexts by relevance.";

const PROBE_PROMPT: &str = "This is a connectivity test. Please respond with 'OK'.";

// Confidence of an LLM ranking
const CONFIDENCE_BASE: f64 = 0.8;
const CONFIDENCE_BONUS: f64 = 0.1;
/// Replies at most this long earn no length bonus.
const SUBSTANTIVE_REPLY_CHARS: usize = 10;

// ============================================================================
// PromptTemplate
// ============================================================================

/// Wording of the rerank prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    #[default]
    Default,
    FunctionAnalysis,
    DependencyCheck,
    ErrorDebugging,
}

impl PromptTemplate {
    fn preamble(&self) -> &'static [&'static str] {
        match self {
            PromptTemplate::Default => &[
                "Given a user query and code contexts from different sources, rank them by relevance to the query.",
                "Consider direct relevance to the query topic, completeness of the code, and source reliability",
                "(call graph facts are exact, vector hits are approximate).",
            ],
            PromptTemplate::FunctionAnalysis => &[
                "You are analyzing C functions. Rank the contexts by relevance to the query.",
                "Prefer function implementations first, then call relationships, then related dependencies.",
            ],
            PromptTemplate::DependencyCheck => &[
                "You are analyzing dependencies between C source files. Rank the contexts by dependency relevance.",
                "Prefer direct include relationships and module interactions.",
            ],
            PromptTemplate::ErrorDebugging => &[
                "You are helping debug C code. Rank the contexts by how likely they are to help solve the problem.",
                "Prefer error-prone code paths and the implementations they call.",
            ],
        }
    }

    /// Extra per-candidate label beyond source and score.
    fn label(&self, item: &ContextItem) -> Option<String> {
        let tag = |key: &str, prefix: &str| item.metadata_str(key).map(|v| format!("{}{}", prefix, v));
        match self {
            PromptTemplate::Default => None,
            PromptTemplate::FunctionAnalysis => {
                let relation = item.metadata_str(META_RELATION_TYPE).unwrap_or("unknown");
                Some(match tag(META_FUNCTION_NAME, "function: ") {
                    Some(f) => format!("{}, {}", relation, f),
                    None => relation.to_string(),
                })
            }
            PromptTemplate::DependencyCheck => tag(META_FILE_PATH, "file: "),
            PromptTemplate::ErrorDebugging => tag(META_FUNCTION_NAME, "function: "),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptTemplate::Default => "default",
            PromptTemplate::FunctionAnalysis => "function_analysis",
            PromptTemplate::DependencyCheck => "dependency_check",
            PromptTemplate::ErrorDebugging => "error_debugging",
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Reranker
// ============================================================================

/// Orders candidates by relevance and keeps the best `top_k`.
///
/// ## Sync Design
///
/// `rerank` blocks on the model call (and on retry backoff).
pub trait Reranker: Send + Sync {
    /// Returns exactly `min(top_k, items.len())` items. Never fails.
    fn rerank(&self, query: &str, items: Vec<ContextItem>, top_k: usize) -> RerankResult;

    /// Live probe of the backing model.
    fn is_available(&self) -> bool;
}

/// Reranker backed by a chat model.
#[derive(Debug, Clone)]
pub struct LlmReranker {
    chat: Option<Arc<dyn ChatModel>>,
    config: RerankerConfig,
}

impl LlmReranker {
    /// Create a reranker. Without a chat model every oversized set falls back
    /// to score order.
    pub fn new(chat: Option<Arc<dyn ChatModel>>, config: RerankerConfig) -> Self {
        Self { chat, config }
    }

    pub fn config(&self) -> &RerankerConfig {
        &self.config
    }

    fn rank_with_llm(
        &self,
        chat: &dyn ChatModel,
        query: &str,
        items: &[ContextItem],
    ) -> Option<(Vec<usize>, f64)> {
        let prompt = build_prompt(self.config.prompt_template, query, items, self.config.preview_chars);
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

        let reply = self.chat_with_retry(chat, &messages)?;

        let Some(raw) = parse_indices(&reply) else {
            warn!("Rerank reply is not a JSON array of integers, using score order");
            debug!("Rerank reply was: {}", reply);
            return None;
        };

        let order = normalize_ranking(&raw, items.len());
        let raw_was_clean = count_valid_unique(&raw, items.len()) == raw.len();

        let mut confidence = CONFIDENCE_BASE;
        if reply.trim().chars().count() > SUBSTANTIVE_REPLY_CHARS {
            confidence += CONFIDENCE_BONUS;
        }
        if raw_was_clean {
            confidence += CONFIDENCE_BONUS;
        }
        Some((order, confidence.min(1.0)))
    }

    /// Call the model up to `max_attempts` times. Empty replies count as
    /// failures; non-transient errors stop early.
    fn chat_with_retry(&self, chat: &dyn ChatModel, messages: &[ChatMessage]) -> Option<String> {
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            let error = match chat.chat(messages) {
                Ok(reply) if !reply.trim().is_empty() => return Some(reply),
                Ok(_) => ModelError::invalid_response("empty reply"),
                Err(e) => e,
            };

            warn!("Rerank attempt {}/{} failed: {}", attempt, attempts, error);
            if !error.is_transient() || attempt == attempts {
                break;
            }

            let backoff = Duration::from_millis(self.config.backoff_ms * u64::from(attempt));
            if !backoff.is_zero() {
                thread::sleep(backoff);
            }
        }

        warn!("Rerank model unavailable, using score order");
        None
    }
}

impl Reranker for LlmReranker {
    fn rerank(&self, query: &str, items: Vec<ContextItem>, top_k: usize) -> RerankResult {
        let started = Instant::now();
        let original_count = items.len();

        if items.len() <= top_k {
            debug!("{} candidates fit in top {}; no rerank needed", items.len(), top_k);
            return score_order(items, top_k, started, 1.0);
        }

        if !self.config.enabled {
            debug!("Reranker disabled; cutting {} candidates by score", original_count);
            return score_order(items, top_k, started, 1.0);
        }

        let Some(chat) = &self.chat else {
            warn!("No chat model configured for reranking, using score order");
            return score_order(items, top_k, started, 0.0);
        };

        match self.rank_with_llm(chat.as_ref(), query, &items) {
            Some((order, confidence)) => {
                let mut slots: Vec<Option<ContextItem>> = items.into_iter().map(Some).collect();
                let reranked: Vec<ContextItem> = order
                    .into_iter()
                    .filter_map(|idx| slots[idx].take())
                    .take(top_k)
                    .collect();

                let rerank_time = started.elapsed();
                info!(
                    "Reranked {} candidates to {} in {:?} (confidence {:.2})",
                    original_count,
                    reranked.len(),
                    rerank_time,
                    confidence
                );
                RerankResult {
                    items: reranked,
                    rerank_time,
                    original_count,
                    confidence,
                }
            }
            None => score_order(items, top_k, started, 0.0),
        }
    }

    fn is_available(&self) -> bool {
        let Some(chat) = &self.chat else {
            return false;
        };
        match chat.chat(&[ChatMessage::user(PROBE_PROMPT)]) {
            Ok(reply) => !reply.trim().is_empty(),
            Err(e) => {
                warn!("Rerank model not available: {}", e);
                false
            }
        }
    }
}

/// Sort by relevance score and keep the first `top_k`.
fn score_order(
    mut items: Vec<ContextItem>,
    top_k: usize,
    started: Instant,
    confidence: f64,
) -> RerankResult {
    let original_count = items.len();
    sort_by_score_desc(&mut items);
    items.truncate(top_k);
    RerankResult {
        items,
        rerank_time: started.elapsed(),
        original_count,
        confidence,
    }
}

// ============================================================================
// Prompt and reply handling
// ============================================================================

fn build_prompt(
    template: PromptTemplate,
    query: &str,
    items: &[ContextItem],
    preview_chars: usize,
) -> String {
    let mut prompt = template.preamble().join("\n");
    prompt.push_str(&format!("\n\nQuery: {}\n\nCandidates:\n", query));

    for (idx, item) in items.iter().enumerate() {
        let mut header = format!(
            "[{}] ({}, score {:.2}",
            idx,
            item.source_type(),
            item.relevance_score()
        );
        if let Some(label) = template.label(item) {
            header.push_str(", ");
            header.push_str(&label);
        }
        header.push(')');

        prompt.push_str(&header);
        prompt.push('\n');
        prompt.push_str(&preview(item.content(), preview_chars));
        prompt.push_str("\n\n");
    }

    prompt.push_str(
        "Return ONLY a JSON array of the candidate indices ordered from most to least relevant, \
         for example [2, 0, 1]. No explanation.",
    );
    prompt
}

/// The first `max_chars` characters of `content`, marked when cut.
fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Decode a reply into raw indices. `None` unless it holds a JSON integer array.
fn parse_indices(reply: &str) -> Option<Vec<i64>> {
    let body = strip_code_fence(reply);
    serde_json::from_str::<Vec<i64>>(body)
        .ok()
        .or_else(|| {
            let array = extract_delimited(body, '[', ']')?;
            serde_json::from_str::<Vec<i64>>(array).ok()
        })
}

/// Turn raw model indices into a full permutation of `0..len`.
///
/// Out-of-range and repeated indices are dropped; unmentioned indices follow
/// in ascending order.
fn normalize_ranking(raw: &[i64], len: usize) -> Vec<usize> {
    let mut seen = HashSet::with_capacity(len);
    let mut order = Vec::with_capacity(len);

    for &idx in raw {
        if let Ok(idx) = usize::try_from(idx) {
            if idx < len && seen.insert(idx) {
                order.push(idx);
            }
        }
    }
    order.extend((0..len).filter(|idx| !seen.contains(idx)));
    order
}

fn count_valid_unique(raw: &[i64], len: usize) -> usize {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|&idx| usize::try_from(idx).ok())
        .filter(|&idx| idx < len && seen.insert(idx))
        .count()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SourceType;
    use codelens_model::ModelResult;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies in order; the last one repeats.
    #[derive(Debug)]
    struct ScriptedChat {
        replies: Mutex<VecDeque<ModelResult<String>>>,
        last: fn() -> ModelResult<String>,
        calls: Mutex<usize>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<ModelResult<String>>, last: fn() -> ModelResult<String>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                last,
                calls: Mutex::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn replying(reply: &'static str) -> Arc<Self> {
            Self::new(vec![Ok(reply.to_string())], || Ok(String::new()))
        }

        fn always_failing() -> Arc<Self> {
            Self::new(vec![], || Err(ModelError::request("scripted", "connection refused")))
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl ChatModel for ScriptedChat {
        fn chat(&self, messages: &[ChatMessage]) -> ModelResult<String> {
            *self.calls.lock().unwrap() += 1;
            if let Some(last) = messages.last() {
                self.prompts.lock().unwrap().push(last.content.clone());
            }
            match self.replies.lock().unwrap().pop_front() {
                Some(reply) => reply,
                None => (self.last)(),
            }
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    fn fast_config() -> RerankerConfig {
        RerankerConfig {
            backoff_ms: 0,
            ..RerankerConfig::default()
        }
    }

    fn reranker(chat: &Arc<ScriptedChat>) -> LlmReranker {
        LlmReranker::new(Some(chat.clone() as Arc<dyn ChatModel>), fast_config())
    }

    fn items(scores: &[f64]) -> Vec<ContextItem> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| ContextItem::new(format!("item {}", i), SourceType::Vector, *s).unwrap())
            .collect()
    }

    fn contents(result: &RerankResult) -> Vec<&str> {
        result.items.iter().map(|i| i.content()).collect()
    }

    #[test]
    fn test_fast_path_sorts_without_calling_model() {
        let chat = ScriptedChat::replying("[0]");
        let result = reranker(&chat).rerank("q", items(&[0.2, 0.9, 0.5]), 3);

        assert_eq!(chat.calls(), 0);
        assert_eq!(contents(&result), ["item 1", "item 2", "item 0"]);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.original_count, 3);
    }

    #[test]
    fn test_llm_order_is_applied() {
        let chat = ScriptedChat::replying("```json\n[2, 0, 3, 1]\n```");
        let result = reranker(&chat).rerank("q", items(&[0.9, 0.8, 0.7, 0.6]), 2);

        assert_eq!(chat.calls(), 1);
        assert_eq!(contents(&result), ["item 2", "item 0"]);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_index_safety() {
        let chat = ScriptedChat::replying("[5, 1, 1, -1, 0]");
        let result = reranker(&chat).rerank("q", items(&[0.9, 0.8, 0.7]), 2);

        assert_eq!(contents(&result), ["item 1", "item 0"]);
        // dirty ranking loses the cleanliness bonus
        assert!((result.confidence - 0.9).abs() < 1e-9);

        assert_eq!(normalize_ranking(&[5, 1, 1, -1, 0], 3), [1, 0, 2]);
    }

    #[test]
    fn test_array_inside_prose_is_accepted() {
        assert_eq!(parse_indices("Ranking: [1, 0] as requested"), Some(vec![1, 0]));
        assert_eq!(parse_indices("1, 0"), None);
        assert_eq!(parse_indices(r#"["a", "b"]"#), None);
        assert_eq!(parse_indices("[1.5, 2]"), None);
    }

    #[test]
    fn test_fallback_when_model_always_fails() {
        let chat = ScriptedChat::always_failing();
        let result = reranker(&chat).rerank("q", items(&[0.1, 0.9, 0.5, 0.7]), 2);

        assert_eq!(chat.calls(), 3);
        assert_eq!(contents(&result), ["item 1", "item 3"]);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.original_count, 4);
    }

    #[test]
    fn test_empty_reply_is_retried() {
        let chat = ScriptedChat::new(
            vec![Ok("   ".to_string()), Ok("[1, 0, 2]".to_string())],
            || Ok(String::new()),
        );
        let result = reranker(&chat).rerank("q", items(&[0.9, 0.8, 0.7]), 2);

        assert_eq!(chat.calls(), 2);
        assert_eq!(contents(&result), ["item 1", "item 0"]);
    }

    #[test]
    fn test_non_transient_error_stops_retrying() {
        let chat = ScriptedChat::new(vec![], || {
            Err(ModelError::MissingApiKey {
                env_var: "OPENROUTER_API_KEY".to_string(),
            })
        });
        let result = reranker(&chat).rerank("q", items(&[0.3, 0.9, 0.5]), 1);

        assert_eq!(chat.calls(), 1);
        assert_eq!(contents(&result), ["item 1"]);
    }

    #[test]
    fn test_unparseable_reply_falls_back() {
        let chat = ScriptedChat::replying("The second one is best.");
        let result = reranker(&chat).rerank("q", items(&[0.3, 0.9, 0.5]), 2);

        assert_eq!(chat.calls(), 1);
        assert_eq!(contents(&result), ["item 1", "item 2"]);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_disabled_cuts_by_score() {
        let chat = ScriptedChat::replying("[0]");
        let config = RerankerConfig {
            enabled: false,
            ..fast_config()
        };
        let reranker = LlmReranker::new(Some(chat.clone() as Arc<dyn ChatModel>), config);

        let result = reranker.rerank("q", items(&[0.3, 0.9, 0.5]), 2);
        assert_eq!(chat.calls(), 0);
        assert_eq!(contents(&result), ["item 1", "item 2"]);
    }

    #[test]
    fn test_prompt_indexes_and_truncates() {
        let chat = ScriptedChat::replying("[0, 1]");
        let long = ContextItem::new("é".repeat(50), SourceType::CallGraph, 0.9)
            .unwrap()
            .with_metadata(META_RELATION_TYPE, "definition")
            .with_metadata(META_FUNCTION_NAME, "sbi_init");
        let config = RerankerConfig {
            preview_chars: 10,
            prompt_template: PromptTemplate::FunctionAnalysis,
            ..fast_config()
        };
        let reranker = LlmReranker::new(Some(chat.clone() as Arc<dyn ChatModel>), config);

        reranker.rerank("what calls sbi_init?", vec![long, items(&[0.5]).remove(0)], 1);

        let prompts = chat.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("Query: what calls sbi_init?"));
        assert!(prompt.contains("[0] (call_graph, score 0.90, definition, function: sbi_init)"));
        assert!(prompt.contains(&format!("{}...", "é".repeat(10))));
        assert!(prompt.contains("[1] (vector, score 0.50, unknown)"));
    }

    #[test]
    fn test_availability_probe() {
        assert!(reranker(&ScriptedChat::replying("OK")).is_available());
        assert!(!reranker(&ScriptedChat::always_failing()).is_available());
        assert!(!LlmReranker::new(None, fast_config()).is_available());
    }

    #[test]
    fn test_template_names() {
        let parsed: PromptTemplate = serde_yaml::from_str("error_debugging").unwrap();
        assert_eq!(parsed, PromptTemplate::ErrorDebugging);
        assert_eq!(PromptTemplate::DependencyCheck.to_string(), "dependency_check");
    }
}
