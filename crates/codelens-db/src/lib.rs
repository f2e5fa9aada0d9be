//! # codelens-db
//!
//! Infrastructure layer for CodeLens - the read-mostly backing stores queried
//! while assembling context for a question about a C codebase.
//!
//! The stores are populated by the ingestion pipeline (C parser, embedding
//! pipeline). This crate only opens them and answers queries, so the retrieval
//! engine in `codelens-core` never touches storage formats directly.
//!
//! ## Architecture
//!
//! ```text
//! codelens-cli → codelens-core → (traits)
//!                     ↑
//!               codelens-db (graph store + vector index)
//!               codelens-model (chat + embeddings)
//! ```
//!
//! ## Modules
//!
//! - `graph`: Function/call/include graph ([`graph::GraphStore`], JSONL backend)
//! - `vector`: Embedded chunk index ([`vector::VectorIndexBackend`], JSONL backend)
//!
//! ## Usage
//!
//! ```ignore
//! use codelens_db::graph::{GraphStoreConfig, open_graph_store};
//!
//! let store = open_graph_store(&GraphStoreConfig::new("/repo/.codelens/graph"))?;
//! let callers = store.query_callers("sbi_init")?;
//! ```

pub mod error;
pub mod graph;
pub mod vector;

pub use error::{DbError, DbResult};
