//! Timing tests for retrieval fan-out.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use codelens_core::{
    BuilderConfig, ContextItem, ContextRetriever, IntentAnalysis, MultiSourceBuilder,
    RerankResult, Reranker, RetrievalConfig, RetrievalResult, SourceStatus, SourceType,
};

/// Sleeps, then returns one item.
struct SlowRetriever {
    source: SourceType,
    delay: Duration,
}

impl ContextRetriever for SlowRetriever {
    fn retrieve(&self, _: &str, _: &IntentAnalysis, _: &RetrievalConfig) -> RetrievalResult {
        thread::sleep(self.delay);
        let item = ContextItem::new(format!("from {}", self.source), self.source, 0.5).unwrap();
        RetrievalResult::new(self.source, vec![item], self.delay)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn source_type(&self) -> SourceType {
        self.source
    }
}

struct PassThrough;

impl Reranker for PassThrough {
    fn rerank(&self, _: &str, items: Vec<ContextItem>, top_k: usize) -> RerankResult {
        let original_count = items.len();
        RerankResult {
            items: items.into_iter().take(top_k).collect(),
            rerank_time: Duration::ZERO,
            original_count,
            confidence: 1.0,
        }
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn slow_builder(parallel: bool, delays: [Duration; 3], timeout_seconds: f64) -> MultiSourceBuilder {
    let config = BuilderConfig {
        parallel_retrieval: parallel,
        timeout_seconds,
        ..BuilderConfig::default()
    };
    let mut builder = MultiSourceBuilder::new(config, Arc::new(PassThrough)).unwrap();
    for (source, delay) in SourceType::PRIORITY.into_iter().zip(delays) {
        builder = builder.with_retriever(Arc::new(SlowRetriever { source, delay }));
    }
    builder
}

fn source_names(items: &[ContextItem]) -> Vec<&str> {
    items.iter().map(|i| i.content()).collect()
}

#[test]
fn test_parallel_branches_overlap() {
    let two_secs = Duration::from_secs(2);
    let builder = slow_builder(true, [two_secs; 3], 10.0);

    let started = Instant::now();
    let items = builder.build_context("how does the console start?", &IntentAnalysis::default());
    let elapsed = started.elapsed();

    assert_eq!(items.len(), 3);
    assert!(elapsed >= two_secs, "finished too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "branches ran serially: {:?}", elapsed);
}

#[test]
fn test_sequential_mode_adds_up() {
    let delay = Duration::from_millis(300);
    let builder = slow_builder(false, [delay; 3], 10.0);

    let started = Instant::now();
    let items = builder.build_context("q", &IntentAnalysis::default());

    assert_eq!(items.len(), 3);
    assert!(started.elapsed() >= Duration::from_millis(900));
}

#[test]
fn test_merge_order_ignores_completion_order() {
    // dependency finishes first, call graph last
    let builder = slow_builder(
        true,
        [
            Duration::from_millis(400),
            Duration::from_millis(200),
            Duration::ZERO,
        ],
        10.0,
    );

    let items = builder.build_context("q", &IntentAnalysis::default());

    assert_eq!(
        source_names(&items),
        ["from call_graph", "from vector", "from dependency"]
    );
}

#[test]
fn test_slow_branch_is_cut_at_deadline() {
    let builder = slow_builder(
        true,
        [Duration::ZERO, Duration::from_secs(3), Duration::ZERO],
        0.5,
    );

    let started = Instant::now();
    let outcome = builder.build("q", &IntentAnalysis::default());

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(
        source_names(&outcome.items),
        ["from call_graph", "from dependency"]
    );
    assert_eq!(outcome.sources[1].status, SourceStatus::TimedOut);
    assert_eq!(outcome.missing_sources(), vec![SourceType::Vector]);
}
