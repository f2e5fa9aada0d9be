//! Vector index module for codelens-db.
//!
//! Stores embedded code/doc chunks and answers nearest-neighbour queries.
//! Embedding text into vectors is the caller's job (see `codelens-model`).
//!
//! ## Usage
//!
//! ```ignore
//! use codelens_db::vector::{VectorIndexConfig, open_vector_index};
//!
//! let index = open_vector_index(&VectorIndexConfig::new(768, "/repo/.codelens/vectors"))?;
//! let hits = index.query(&embedding, 10)?;
//! ```

mod backend;
mod config;
mod traits;

pub use backend::{open_vector_index, SimpleFileVectorIndex};
pub use config::{VectorIndexConfig, DATA_FILENAME};
pub use traits::{VectorId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult};
