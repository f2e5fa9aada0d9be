//! # codelens-core
//!
//! **CodeLens** – multi-source context retrieval and reranking for questions
//! about a C codebase.
//!
//! Given a natural-language question, the engine extracts its intent, queries
//! the call graph, the semantic index and the include graph, merges what they
//! return and, when there is too much, asks an LLM to pick the most relevant
//! pieces.
//!
//! ## Main Types
//!
//! - [`CodelensEngine`] – global configuration, opens projects
//! - [`ProjectSession`] – stores, analyzer, builder and reranker of one project
//! - [`MultiSourceBuilder`] – retrieval fan-out, merge, dedup and rerank
//! - [`CodelensError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`context`] – data model (ContextItem, IntentAnalysis, RetrievalConfig, ...)
//! - [`intent`] – question → IntentAnalysis
//! - [`retriever`] – call-graph, vector and dependency retrievers
//! - [`builder`] – the multi-source orchestrator
//! - [`rerank`] – LLM reranking with score-order fallback
//! - [`config`] – configuration types (GlobalConfig, ProjectConfig)
//! - [`engine`] – engine and project sessions
//!
//! ## Example
//!
//! ```ignore
//! use codelens_core::CodelensEngine;
//! use std::path::Path;
//!
//! let engine = CodelensEngine::with_defaults()?;
//! let session = engine.open_project(Path::new("."))?;
//!
//! let bundle = session.build_context("what calls sbi_init?");
//! for item in &bundle.outcome.items {
//!     println!("[{}] {:.2}", item.source_type(), item.relevance_score());
//! }
//! ```

// Modules
pub mod builder;
pub mod config;
pub mod constants;
pub mod context;
pub mod db_adapter;
pub mod engine;
pub mod errors;
pub mod intent;
pub mod llm_output;
pub mod rerank;
pub mod retriever;

// Re-exports for convenience
pub use builder::{BuildOutcome, MultiSourceBuilder, SourceReport, SourceStatus};
pub use config::{
    BuilderConfig, GlobalConfig, IntentConfig, ProjectConfig, RerankerConfig, ScoringConfig,
    SourceConfig, SourcesConfig,
};
pub use context::{
    deduplicate_by_content, sort_by_score_desc, ContextItem, Entity, EntityKind, IntentAnalysis,
    IntentType, RerankResult, RetrievalConfig, RetrievalResult, SourceType,
};
pub use db_adapter::EmbeddedVectorStore;
pub use engine::{CodelensEngine, ContextBundle, ProjectSession, SessionModels, SessionStatus};
pub use errors::{CodelensError, CodelensResult};
pub use intent::IntentAnalyzer;
pub use rerank::{LlmReranker, PromptTemplate, Reranker};
pub use retriever::{
    CallGraphRetriever, ContextRetriever, DependencyRetriever, VectorHit, VectorRetriever,
    VectorStore,
};
