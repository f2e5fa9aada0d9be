//! Code graph storage module for codelens-db.
//!
//! The graph captures the structural facts extracted from a C codebase:
//! - [`FunctionRecord`] - A function definition with its source text
//! - [`CallRecord`] - A caller → callee edge
//! - [`IncludeRecord`] - A `#include` edge between two files
//! - [`GraphStore`] - Read-only query trait used by the retrievers
//!
//! ## Backends
//!
//! - **JSONL**: `functions.jsonl`, `calls.jsonl` and `includes.jsonl` in a
//!   directory, loaded into memory at open time.
//!
//! ## Usage
//!
//! ```ignore
//! use codelens_db::graph::{GraphStoreConfig, open_graph_store};
//!
//! let store = open_graph_store(&GraphStoreConfig::new("/repo/.codelens/graph"))?;
//! if let Some(def) = store.query_function_by_name("sbi_init")? {
//!     println!("{} defined in {}", def.name, def.file_path);
//! }
//! ```

pub mod backend;
pub mod entities;
pub mod traits;

pub use backend::{open_graph_store, JsonlGraphStore};
pub use entities::{
    CallRecord, FunctionRecord, GraphStats, HeaderUsage, IncludeRecord, RelatedFunction,
};
pub use traits::{GraphStore, GraphStoreConfig};
