//! Simple file-based vector index backend.
//!
//! Entries live in a JSONL file and search is a linear scan. Indexes for a
//! single C project are small enough that an ANN structure is not needed.

use super::super::config::VectorIndexConfig;
use super::super::traits::{
    VectorId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult,
};
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, trace};

/// A stored vector entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVector {
    id: u64,
    vector: Vec<f32>,
    content: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<&VectorInsert> for StoredVector {
    fn from(insert: &VectorInsert) -> Self {
        Self {
            id: insert.id.value(),
            vector: insert.vector.clone(),
            content: insert.content.clone(),
            metadata: insert.metadata.clone(),
        }
    }
}

/// Simple file-based vector index.
pub struct SimpleFileVectorIndex {
    /// Path to the index directory.
    path: PathBuf,

    dimension: usize,

    metric: VectorMetric,

    /// Entries in insertion order, so equal scores rank stably.
    vectors: RwLock<Vec<StoredVector>>,
}

impl SimpleFileVectorIndex {
    /// Open a simple file vector index, loading existing data if present.
    pub fn open(config: &VectorIndexConfig) -> DbResult<Self> {
        debug!("Opening SimpleFileVectorIndex at {:?}", config.path);

        let data_path = config.data_path();
        let vectors = if data_path.exists() {
            load_from_file(&data_path)?
        } else {
            Vec::new()
        };

        Ok(Self {
            path: config.path.clone(),
            dimension: config.dimension,
            metric: config.metric,
            vectors: RwLock::new(vectors),
        })
    }

    /// Save all vectors to the JSONL file.
    fn save_to_file(&self, vectors: &[StoredVector]) -> DbResult<()> {
        fs::create_dir_all(&self.path).map_err(|e| DbError::vector_io(&self.path, e.to_string()))?;

        let data_path = self.path.join(super::super::config::DATA_FILENAME);
        debug!("Saving {} vectors to {:?}", vectors.len(), data_path);

        let mut file = File::create(&data_path)?;
        for stored in vectors {
            let line = serde_json::to_string(stored)?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    fn compute_similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            VectorMetric::Cosine => cosine_similarity(a, b),
            VectorMetric::Dot => dot_product(a, b),
        }
    }
}

impl VectorIndexBackend for SimpleFileVectorIndex {
    fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<VectorSearchResult>> {
        trace!("Querying SimpleFileVectorIndex, limit={}", limit);

        if embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let vectors = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let mut scored: Vec<(f32, &StoredVector)> = vectors
            .iter()
            .map(|v| (self.compute_similarity(embedding, &v.vector), v))
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let results: Vec<VectorSearchResult> = scored
            .into_iter()
            .take(limit)
            .map(|(score, stored)| VectorSearchResult {
                id: VectorId::new(stored.id),
                score,
                content: stored.content.clone(),
                metadata: stored.metadata.clone(),
            })
            .collect();

        trace!("Found {} results", results.len());
        Ok(results)
    }

    /// Rewrites the whole JSONL file. Used to seed fixtures, not at query time.
    fn upsert(&self, inserts: &[VectorInsert]) -> DbResult<()> {
        debug!("Upserting {} vectors", inserts.len());

        let mut stored = self
            .vectors
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;

        let mut positions: HashMap<u64, usize> =
            stored.iter().enumerate().map(|(i, v)| (v.id, i)).collect();

        for insert in inserts {
            if insert.vector.len() != self.dimension {
                return Err(DbError::DimensionMismatch {
                    expected: self.dimension,
                    actual: insert.vector.len(),
                });
            }

            let entry = StoredVector::from(insert);
            match positions.get(&entry.id) {
                Some(&pos) => stored[pos] = entry,
                None => {
                    positions.insert(entry.id, stored.len());
                    stored.push(entry);
                }
            }
        }

        self.save_to_file(&stored)
    }

    fn len(&self) -> DbResult<usize> {
        let stored = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(stored.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> VectorMetric {
        self.metric
    }
}

/// Load vectors from a JSONL file, skipping invalid lines.
fn load_from_file(path: &Path) -> DbResult<Vec<StoredVector>> {
    debug!("Loading vectors from {:?}", path);

    let file = File::open(path).map_err(|e| DbError::vector_io(path, e.to_string()))?;
    let reader = BufReader::new(file);

    let mut vectors = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<StoredVector>(&line) {
            Ok(stored) => vectors.push(stored),
            Err(e) => debug!("Skipping invalid line {}: {}", line_num + 1, e),
        }
    }

    debug!("Loaded {} vectors", vectors.len());
    Ok(vectors)
}

// ============================================================================
// Similarity Functions
// ============================================================================

/// Compute cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// Tests
// ============================================================================
