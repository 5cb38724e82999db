//! Dense vector search backends.
//!
//! - [`MemoryVectorIndex`]: in-process linear scan over corpus vectors
//! - [`QdrantClient`]: REST client for a remote Qdrant collection (feature `qdrant`)

mod memory;
#[cfg(feature = "qdrant")]
mod qdrant;

use serde::{Deserialize, Serialize};

pub use memory::{load_vector_records, MemoryVectorIndex};
#[cfg(feature = "qdrant")]
pub use qdrant::{QdrantClient, QdrantConfig};

// ============================================================================
// VectorMetric
// ============================================================================

/// Similarity metric for vector search. Higher scores are always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Dot product.
    Dot,
}

impl VectorMetric {
    /// Get the metric name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Dot => "dot",
        }
    }

    /// Score two vectors under this metric.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            VectorMetric::Cosine => cosine_similarity(a, b),
            VectorMetric::Dot => dot_product(a, b),
        }
    }
}

impl std::fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Records and hits
// ============================================================================

/// A stored vector keyed by the chunk it embeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorRecord {
    /// Chunk identifier.
    pub chunk_id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
}

impl VectorRecord {
    /// Create a new record.
    pub fn new(chunk_id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            vector,
        }
    }
}

/// A single search hit, ordered best-first by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorHit {
    /// Chunk identifier.
    pub chunk_id: String,
    /// Similarity score (higher is better).
    pub score: f32,
}

// ============================================================================
// Similarity Functions
// ============================================================================

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Compute dot product between two vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
