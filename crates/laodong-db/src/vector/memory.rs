//! In-memory vector index.
//!
//! Holds every chunk vector in memory and answers queries with a parallel
//! linear scan. The legal corpus is a few thousand chunks, so a scan is
//! cheaper than maintaining an ANN structure.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::RwLock;

use rayon::prelude::*;
use tracing::{debug, trace};

use super::{VectorHit, VectorMetric, VectorRecord};
use crate::error::{DbError, DbResult};

/// In-memory vector index with linear-scan search.
pub struct MemoryVectorIndex {
    dimension: usize,
    metric: VectorMetric,
    records: RwLock<Stored>,
}

#[derive(Default)]
struct Stored {
    records: Vec<VectorRecord>,
    positions: HashMap<String, usize>,
}

impl std::fmt::Debug for MemoryVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVectorIndex")
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .field("len", &self.len())
            .finish()
    }
}

impl MemoryVectorIndex {
    /// Create an empty index.
    pub fn new(dimension: usize, metric: VectorMetric) -> Self {
        Self {
            dimension,
            metric,
            records: RwLock::new(Stored::default()),
        }
    }

    /// Build an index from records, taking the dimension from the first one.
    pub fn from_records(records: Vec<VectorRecord>, metric: VectorMetric) -> DbResult<Self> {
        let dimension = records.first().map(|r| r.vector.len()).unwrap_or(0);
        let index = Self::new(dimension, metric);
        index.upsert(records)?;
        Ok(index)
    }

    /// Insert or replace records by chunk id.
    pub fn upsert(&self, records: Vec<VectorRecord>) -> DbResult<()> {
        debug!("Upserting {} vectors", records.len());

        let mut stored = self
            .records
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;

        for record in records {
            if record.vector.len() != self.dimension {
                return Err(DbError::DimensionMismatch {
                    expected: self.dimension,
                    actual: record.vector.len(),
                });
            }

            match stored.positions.get(&record.chunk_id).copied() {
                Some(pos) => stored.records[pos] = record,
                None => {
                    let pos = stored.records.len();
                    stored.positions.insert(record.chunk_id.clone(), pos);
                    stored.records.push(record);
                }
            }
        }

        Ok(())
    }

    /// Return the `limit` nearest records, best first.
    ///
    /// Equal scores are ordered by chunk id so results are reproducible.
    pub fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<VectorHit>> {
        trace!("Querying MemoryVectorIndex, limit={}", limit);

        if embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let records = self
            .records
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let mut scored: Vec<(f32, &str)> = records
            .records
            .par_iter()
            .map(|r| (self.metric.score(embedding, &r.vector), r.chunk_id.as_str()))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });

        let hits: Vec<VectorHit> = scored
            .into_iter()
            .take(limit)
            .map(|(score, chunk_id)| VectorHit {
                chunk_id: chunk_id.to_string(),
                score,
            })
            .collect();

        trace!("Found {} results", hits.len());
        Ok(hits)
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.records.len()).unwrap_or(0)
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Similarity metric.
    pub fn metric(&self) -> VectorMetric {
        self.metric
    }
}

/// Load vector records from a JSONL file (`{"chunkId": ..., "vector": [...]}` per line).
pub fn load_vector_records(path: &Path) -> DbResult<Vec<VectorRecord>> {
    let file = File::open(path).map_err(|e| DbError::vector_io(path, e.to_string()))?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DbError::vector_io(path, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: VectorRecord = serde_json::from_str(&line)
            .map_err(|e| DbError::vector_parse(path, format!("line {}: {}", line_no + 1, e)))?;
        records.push(record);
    }

    debug!("Loaded {} vectors from {}", records.len(), path.display());
    Ok(records)
}
