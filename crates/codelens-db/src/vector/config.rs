//! Vector index configuration.

use super::traits::VectorMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filename for the JSONL data file.
pub const DATA_FILENAME: &str = "vectors.jsonl";

/// Configuration for opening a vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexConfig {
    /// Dimension of vectors in the index.
    pub dimension: usize,

    /// Path to the index directory.
    pub path: PathBuf,

    /// Similarity metric.
    #[serde(default)]
    pub metric: VectorMetric,
}

impl VectorIndexConfig {
    pub fn new(dimension: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            path: path.into(),
            metric: VectorMetric::Cosine,
        }
    }

    pub fn with_metric(mut self, metric: VectorMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Full path of the data file.
    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILENAME)
    }
}
