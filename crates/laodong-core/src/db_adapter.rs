//! Adapter layer for laodong-db infrastructure.
//!
//! Bridges the dense search backends to the [`VectorSearch`] capability:
//!
//! - error conversion from `DbError` to `LaodongError` (startup) and to
//!   `CapabilityError` (per call)
//! - `MemoryVectorSearch`: in-process index over corpus vectors
//! - `QdrantVectorSearch`: Qdrant REST collection
//!
//! ## Architecture
//!
//! ```text
//! laodong-core retriever (dense leg)
//!        ↓
//!   db_adapter (this module) - wrappers + conversions
//!        ↓
//!     laodong-db backends (MemoryVectorIndex, QdrantClient)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use laodong_db::vector::{MemoryVectorIndex, QdrantClient, QdrantConfig, VectorHit};
use laodong_db::DbError;

use crate::capabilities::{CapabilityError, CapabilityResult, ScoredChunk, VectorSearch};
use crate::errors::LaodongError;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a laodong-db error raised while constructing a backend.
pub fn from_db_error(err: DbError) -> LaodongError {
    match err {
        DbError::Config { message } => LaodongError::invalid_configuration(
            message,
            "Check backends.dense in config.yaml",
        ),
        DbError::DimensionMismatch { expected, actual } => LaodongError::invalid_configuration(
            format!(
                "corpus vectors have mixed dimensions (expected {}, got {})",
                expected, actual
            ),
            "Re-export the corpus with a single embedding model",
        ),
        DbError::VectorIo { path, message } | DbError::VectorParse { path, message } => {
            LaodongError::invalid_configuration(
                format!("cannot load vectors from {}: {}", path.display(), message),
                "Check backends.dense.vectorsPath in config.yaml",
            )
        }
        other => LaodongError::Db(other),
    }
}

/// Convert a laodong-db error raised by a search call.
pub fn to_capability_error(err: DbError) -> CapabilityError {
    match &err {
        DbError::Unreachable { .. } => CapabilityError::unavailable("dense", err.to_string()),
        DbError::InvalidResponse { .. } | DbError::Json(_) => {
            CapabilityError::protocol("dense", err.to_string())
        }
        _ => CapabilityError::backend("dense", err.to_string()),
    }
}

fn to_scored(hits: Vec<VectorHit>) -> Vec<ScoredChunk> {
    hits.into_iter()
        .map(|hit| ScoredChunk::new(hit.chunk_id, hit.score))
        .collect()
}

// ============================================================================
// In-memory index
// ============================================================================

/// [`VectorSearch`] over an in-process index.
#[derive(Debug, Clone)]
pub struct MemoryVectorSearch {
    index: Arc<MemoryVectorIndex>,
}

impl MemoryVectorSearch {
    pub fn new(index: Arc<MemoryVectorIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &MemoryVectorIndex {
        &self.index
    }
}

#[async_trait]
impl VectorSearch for MemoryVectorSearch {
    fn name(&self) -> &str {
        "memory"
    }

    async fn vector_search(&self, vector: &[f32], k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
        let index = self.index.clone();
        let query = vector.to_vec();
        let hits = tokio::task::spawn_blocking(move || index.query(&query, k))
            .await
            .map_err(|e| CapabilityError::backend("dense", format!("search task failed: {}", e)))?
            .map_err(to_capability_error)?;
        Ok(to_scored(hits))
    }

    async fn health(&self) -> CapabilityResult<()> {
        if self.index.is_empty() {
            return Err(CapabilityError::unavailable("dense", "vector index is empty"));
        }
        Ok(())
    }
}

// ============================================================================
// Qdrant
// ============================================================================

/// [`VectorSearch`] over a Qdrant collection.
#[derive(Debug, Clone)]
pub struct QdrantVectorSearch {
    client: QdrantClient,
}

impl QdrantVectorSearch {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &QdrantConfig) -> Result<Self, LaodongError> {
        let client = QdrantClient::new(config.clone()).map_err(from_db_error)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl VectorSearch for QdrantVectorSearch {
    fn name(&self) -> &str {
        self.client.collection()
    }

    async fn vector_search(&self, vector: &[f32], k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
        let hits = self
            .client
            .search(vector, k)
            .await
            .map_err(to_capability_error)?;
        Ok(to_scored(hits))
    }

    async fn health(&self) -> CapabilityResult<()> {
        self.client.ping().await.map_err(to_capability_error)
    }
}
