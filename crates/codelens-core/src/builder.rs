//! Multi-source context builder.
//!
//! Fans a question out to every enabled retriever, joins the branches, merges
//! their items in source priority order, removes duplicate content and hands
//! oversized sets to the reranker.
//!
//! ## Concurrency
//!
//! Each build creates a rayon pool with one thread per branch. Branches report
//! over a channel; the builder waits for each until the shared deadline
//! (`timeoutSeconds` after fan-out start). A branch that misses the deadline,
//! panics, or whose source is unavailable contributes nothing. Merge order is
//! fixed (call graph, vector, dependency) whatever order branches finish in.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BuilderConfig;
use crate::context::{
    deduplicate_by_content, ContextItem, IntentAnalysis, RetrievalConfig, RetrievalResult,
    SourceType,
};
use crate::errors::CodelensResult;
use crate::rerank::Reranker;
use crate::retriever::ContextRetriever;

// ============================================================================
// Outcome types
// ============================================================================

/// How one source fared during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// The retriever ran to completion (possibly with no items).
    Ok,
    /// Turned off in configuration.
    Disabled,
    /// Enabled, but no retriever is registered or its store is down.
    Unavailable,
    /// The retriever panicked.
    Failed,
    /// No result before the deadline.
    TimedOut,
}

impl SourceStatus {
    /// Whether an enabled source produced nothing because something went wrong.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            SourceStatus::Unavailable | SourceStatus::Failed | SourceStatus::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Disabled => "disabled",
            SourceStatus::Unavailable => "unavailable",
            SourceStatus::Failed => "failed",
            SourceStatus::TimedOut => "timed_out",
        }
    }
}

/// Per-source line of a [`BuildOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: SourceType,
    pub status: SourceStatus,
    /// Items contributed to the merge.
    pub item_count: usize,
    /// Candidates the retriever saw before its own cut.
    pub total_candidates: usize,
    pub elapsed_ms: u64,
}

/// Result of one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutcome {
    /// Final context, at most `finalTopK` items.
    pub items: Vec<ContextItem>,

    /// One report per source, in priority order.
    pub sources: Vec<SourceReport>,

    /// Items after concatenation, before dedup.
    pub merged_count: usize,

    /// Items after dedup.
    pub deduped_count: usize,

    /// Whether the reranker was invoked.
    pub reranked: bool,

    /// Rerank confidence (1.0 when skipped, 0.0 when nothing was found),
    /// less the missing-source penalty.
    pub confidence: f64,

    pub elapsed_ms: u64,
}

impl BuildOutcome {
    /// Sources that were enabled but contributed nothing due to a fault.
    pub fn missing_sources(&self) -> Vec<SourceType> {
        self.sources
            .iter()
            .filter(|r| r.status.is_missing())
            .map(|r| r.source)
            .collect()
    }
}

// ============================================================================
// MultiSourceBuilder
// ============================================================================

/// Orchestrates retrievers and the reranker for one project.
///
/// ## Sync Design
///
/// [`build`](Self::build) blocks the caller until every branch has reported
/// or the deadline passed, then runs the reranker on the caller thread.
pub struct MultiSourceBuilder {
    config: BuilderConfig,
    retrieval_configs: HashMap<SourceType, RetrievalConfig>,
    retrievers: HashMap<SourceType, Arc<dyn ContextRetriever>>,
    reranker: Arc<dyn Reranker>,
    /// Validated `timeoutSeconds`, shared by every branch.
    timeout: Duration,
}

struct Branch {
    source: SourceType,
    retriever: Arc<dyn ContextRetriever>,
    config: RetrievalConfig,
}

struct BranchOutcome {
    source: SourceType,
    status: SourceStatus,
    result: RetrievalResult,
    elapsed: Duration,
}

impl BranchOutcome {
    fn without_result(source: SourceType, status: SourceStatus, elapsed: Duration) -> Self {
        Self {
            source,
            status,
            result: RetrievalResult::empty(source),
            elapsed,
        }
    }
}

impl MultiSourceBuilder {
    /// Create a builder with no retrievers registered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CodelensError::InvalidConfiguration`] if `config` is
    /// invalid. Soft issues are logged as warnings.
    pub fn new(config: BuilderConfig, reranker: Arc<dyn Reranker>) -> CodelensResult<Self> {
        for warning in config.validate()? {
            warn!("Config warning: {}", warning);
        }

        let mut retrieval_configs = HashMap::new();
        let mut timeout = Duration::ZERO;
        for source in SourceType::PRIORITY {
            let retrieval = config.retrieval_config(source)?;
            timeout = retrieval.timeout();
            retrieval_configs.insert(source, retrieval);
        }

        Ok(Self {
            config,
            retrieval_configs,
            retrievers: HashMap::new(),
            reranker,
            timeout,
        })
    }

    /// Register a retriever, replacing any previous one for the same source.
    pub fn with_retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retrievers.insert(retriever.source_type(), retriever);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build the final context for a question.
    pub fn build_context(&self, query: &str, intent: &IntentAnalysis) -> Vec<ContextItem> {
        self.build(query, intent).items
    }

    /// Build with the configured `finalTopK`.
    pub fn build(&self, query: &str, intent: &IntentAnalysis) -> BuildOutcome {
        self.build_top_k(query, intent, self.config.final_top_k)
    }

    /// Build with an explicit final size (at least 1).
    pub fn build_top_k(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        final_top_k: usize,
    ) -> BuildOutcome {
        let started = Instant::now();
        let final_top_k = final_top_k.max(1);

        let (branches, mut reports) = self.plan();
        let outcomes = if self.config.parallel_retrieval && branches.len() > 1 {
            self.retrieve_parallel(query, intent, branches)
        } else {
            self.retrieve_sequential(query, intent, branches)
        };

        // Merge in priority order regardless of completion order.
        let mut by_source: HashMap<SourceType, BranchOutcome> =
            outcomes.into_iter().map(|o| (o.source, o)).collect();
        let mut merged = Vec::new();
        for source in SourceType::PRIORITY {
            let Some(outcome) = by_source.remove(&source) else {
                continue;
            };
            debug!(
                source = %source,
                status = outcome.status.as_str(),
                items = outcome.result.items.len(),
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "Branch joined"
            );
            reports.insert(
                source,
                SourceReport {
                    source,
                    status: outcome.status,
                    item_count: outcome.result.items.len(),
                    total_candidates: outcome.result.total_candidates,
                    elapsed_ms: outcome.elapsed.as_millis() as u64,
                },
            );
            merged.extend(outcome.result.items);
        }

        let merged_count = merged.len();
        let deduped = deduplicate_by_content(merged);
        let deduped_count = deduped.len();

        let (items, reranked, base_confidence) = if deduped_count == 0 {
            (deduped, false, 0.0)
        } else if deduped_count <= final_top_k {
            (deduped, false, 1.0)
        } else {
            let result = self.reranker.rerank(query, deduped, final_top_k);
            (result.items, true, result.confidence)
        };

        let sources: Vec<SourceReport> = SourceType::PRIORITY
            .iter()
            .filter_map(|s| reports.remove(s))
            .collect();
        let missing = sources.iter().filter(|r| r.status.is_missing()).count();
        let confidence =
            (base_confidence - self.config.missing_source_penalty * missing as f64).max(0.0);

        let outcome = BuildOutcome {
            items,
            sources,
            merged_count,
            deduped_count,
            reranked,
            confidence,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if outcome.items.is_empty() {
            warn!("No context items retrieved from any source");
        }
        info!(
            "Context built: {} merged, {} after dedup, {} returned{} in {} ms",
            outcome.merged_count,
            outcome.deduped_count,
            outcome.items.len(),
            if outcome.reranked { " (reranked)" } else { "" },
            outcome.elapsed_ms
        );
        outcome
    }

    /// Enabled branches, plus reports for sources that will not run.
    fn plan(&self) -> (Vec<Branch>, BTreeMap<SourceType, SourceReport>) {
        let mut branches = Vec::new();
        let mut reports = BTreeMap::new();

        for source in SourceType::PRIORITY {
            let skipped = |status| SourceReport {
                source,
                status,
                item_count: 0,
                total_candidates: 0,
                elapsed_ms: 0,
            };

            if !self.config.sources.get(source).enable {
                reports.insert(source, skipped(SourceStatus::Disabled));
                continue;
            }
            let (Some(retriever), Some(config)) =
                (self.retrievers.get(&source), self.retrieval_configs.get(&source))
            else {
                warn!("{} source is enabled but has no retriever", source);
                reports.insert(source, skipped(SourceStatus::Unavailable));
                continue;
            };

            branches.push(Branch {
                source,
                retriever: Arc::clone(retriever),
                config: *config,
            });
        }
        (branches, reports)
    }

    fn retrieve_parallel(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        branches: Vec<Branch>,
    ) -> Vec<BranchOutcome> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(branches.len())
            .thread_name(|i| format!("codelens-retriever-{}", i))
            .panic_handler(|_| warn!("Retriever branch panicked"))
            .build();
        let pool = match pool {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Failed to start retriever pool, running sequentially: {}", e);
                return self.retrieve_sequential(query, intent, branches);
            }
        };

        let started = Instant::now();
        let deadline = started.checked_add(self.timeout);

        let pending: Vec<(SourceType, mpsc::Receiver<BranchOutcome>)> = branches
            .into_iter()
            .map(|branch| {
                let (tx, rx) = mpsc::channel();
                let source = branch.source;
                let query = query.to_string();
                let intent = intent.clone();
                pool.spawn(move || {
                    let outcome = run_branch(&branch, &query, &intent, started);
                    // The receiver is gone once the deadline passed.
                    let _ = tx.send(outcome);
                });
                (source, rx)
            })
            .collect();

        // Late branches keep running on the pool; dropping it does not block.
        pending
            .into_iter()
            .map(|(source, rx)| {
                let remaining = match deadline {
                    Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                    None => self.timeout.saturating_sub(started.elapsed()),
                };
                match rx.recv_timeout(remaining) {
                    Ok(outcome) => outcome,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        warn!("{} retrieval timed out after {:?}", source, self.timeout);
                        BranchOutcome::without_result(source, SourceStatus::TimedOut, started.elapsed())
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        warn!("{} retrieval failed", source);
                        BranchOutcome::without_result(source, SourceStatus::Failed, started.elapsed())
                    }
                }
            })
            .collect()
    }

    /// Run branches one after another on the caller thread. A result that
    /// arrives after its branch's deadline is discarded.
    fn retrieve_sequential(
        &self,
        query: &str,
        intent: &IntentAnalysis,
        branches: Vec<Branch>,
    ) -> Vec<BranchOutcome> {
        branches
            .iter()
            .map(|branch| {
                let started = Instant::now();
                let caught = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_branch(branch, query, intent, started)
                }));
                match caught {
                    Ok(outcome) if outcome.elapsed > self.timeout => {
                        warn!("{} retrieval timed out after {:?}", branch.source, self.timeout);
                        BranchOutcome::without_result(branch.source, SourceStatus::TimedOut, outcome.elapsed)
                    }
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("{} retrieval panicked", branch.source);
                        BranchOutcome::without_result(branch.source, SourceStatus::Failed, started.elapsed())
                    }
                }
            })
            .collect()
    }

    /// Liveness of every component, keyed `retriever_<source>` and `reranker`.
    pub fn health_check(&self) -> BTreeMap<String, bool> {
        let mut health = BTreeMap::new();
        for source in SourceType::PRIORITY {
            let alive = self
                .retrievers
                .get(&source)
                .is_some_and(|r| r.is_available());
            health.insert(format!("retriever_{}", source), alive);
        }
        health.insert("reranker".to_string(), self.reranker.is_available());
        health
    }

    /// Enabled sources whose retriever reports itself available.
    pub fn available_sources(&self) -> Vec<SourceType> {
        SourceType::PRIORITY
            .into_iter()
            .filter(|s| self.config.sources.get(*s).enable)
            .filter(|s| self.retrievers.get(s).is_some_and(|r| r.is_available()))
            .collect()
    }
}

fn run_branch(
    branch: &Branch,
    query: &str,
    intent: &IntentAnalysis,
    started: Instant,
) -> BranchOutcome {
    if !branch.retriever.is_available() {
        warn!("{} source is not available", branch.source);
        return BranchOutcome::without_result(branch.source, SourceStatus::Unavailable, started.elapsed());
    }

    let result = branch.retriever.retrieve(query, intent, &branch.config);
    BranchOutcome {
        source: branch.source,
        status: SourceStatus::Ok,
        result,
        elapsed: started.elapsed(),
    }
}

// ============================================================================
// Tests
// ============================================================================
