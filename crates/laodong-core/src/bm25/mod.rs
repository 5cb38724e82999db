//! BM25 Sparse Retrieval for Hybrid Search.
//!
//! Lexical retrieval complements dense retrieval: article numbers, instrument
//! codes and fixed legal phrases ("trợ cấp thôi việc") are matched exactly
//! here even when the embedding model blurs them.
//!
//! ## Architecture
//!
//! ```text
//! Query
//!   │
//!   ├──► Dense Retrieval (embed + vector search)
//!   │        └──► denseTopK candidates
//!   │
//!   └──► Sparse Retrieval (BM25 inverted index)
//!            └──► sparseTopK candidates
//!                      │
//!                      ▼
//!              RRF Score Fusion
//!                      │
//!                      ▼
//!              Cross-Encoder Reranker
//!                      │
//!                      ▼
//!                rerankerTopN results
//! ```
//!
//! ## Key Components
//!
//! - [`tokenizer`]: syllable tokenizer with Vietnamese stop words and bigrams
//! - [`index`]: BM25 inverted index and scoring
//! - [`scorer`]: BM25 scoring algorithm (k1=1.2, b=0.75)
//!
//! The index is built in memory from the corpus at startup.

mod index;
mod scorer;
mod tokenizer;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

pub use index::Bm25Index;
pub use scorer::{bm25_term_score, idf, Bm25Params};
pub use tokenizer::{Tokenizer, TokenizerConfig};

use crate::capabilities::{CapabilityError, CapabilityResult, ScoredChunk, SparseSearch};
use crate::errors::LaodongError;

// ============================================================================
// Configuration
// ============================================================================

/// BM25 configuration.
///
/// Controls tokenization and scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25Config {
    /// BM25 k1 parameter - term frequency saturation.
    /// Default: 1.2
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// BM25 b parameter - document length normalization.
    /// 0 = no length normalization, 1 = full normalization.
    /// Default: 0.75
    #[serde(default = "default_b")]
    pub b: f32,

    /// Whether to remove stop words during tokenization.
    /// Default: true
    #[serde(default = "default_remove_stopwords")]
    pub remove_stopwords: bool,

    /// Minimum token length to include, in characters.
    /// Default: 1
    #[serde(default = "default_min_token_length")]
    pub min_token_length: usize,

    /// Index adjacent-syllable bigrams.
    /// Default: true
    #[serde(default = "default_bigrams")]
    pub bigrams: bool,
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

fn default_remove_stopwords() -> bool {
    true
}

fn default_min_token_length() -> usize {
    1
}

fn default_bigrams() -> bool {
    true
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            remove_stopwords: default_remove_stopwords(),
            min_token_length: default_min_token_length(),
            bigrams: default_bigrams(),
        }
    }
}

impl Bm25Config {
    /// Validate BM25 parameters, returning warnings for questionable values.
    pub fn validate(&self) -> Result<Vec<String>, LaodongError> {
        let mut warnings = Vec::new();

        if self.k1 < 0.0 {
            return Err(LaodongError::invalid_configuration(
                "retrieval.bm25.k1 cannot be negative",
                "Set k1 to a value between 0.5 and 2.0 (recommended: 1.2)",
            ));
        }

        if !(0.0..=1.0).contains(&self.b) {
            return Err(LaodongError::invalid_configuration(
                format!("retrieval.bm25.b must be within [0, 1], got {}", self.b),
                "Set b between 0 (no length normalization) and 1 (recommended: 0.75)",
            ));
        }

        if self.min_token_length > 3 {
            warnings.push(format!(
                "retrieval.bm25.minTokenLength={} drops most Vietnamese syllables (recommended: 1)",
                self.min_token_length
            ));
        }

        Ok(warnings)
    }
}

/// Result from BM25 search.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25SearchResult {
    /// Document ID (chunk id).
    pub doc_id: String,
    /// BM25 score.
    pub score: f32,
    /// Rank in the BM25 result list (1-indexed).
    pub rank: usize,
}

// ============================================================================
// Bm25Retriever
// ============================================================================

/// [`SparseSearch`] over an in-process [`Bm25Index`].
///
/// Scoring runs on the blocking pool so a large posting scan never stalls
/// the runtime threads serving token streams.
#[derive(Debug, Clone)]
pub struct Bm25Retriever {
    index: Arc<Bm25Index>,
}

impl Bm25Retriever {
    pub fn new(index: Bm25Index) -> Self {
        Self {
            index: Arc::new(index),
        }
    }

    pub fn index(&self) -> &Bm25Index {
        &self.index
    }
}

#[async_trait]
impl SparseSearch for Bm25Retriever {
    fn name(&self) -> &str {
        "bm25"
    }

    async fn sparse_search(&self, query: &str, k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
        let index = Arc::clone(&self.index);
        let query = query.to_string();

        let results = tokio::task::spawn_blocking(move || index.search(&query, k))
            .await
            .map_err(|e| CapabilityError::backend("sparse", format!("BM25 task failed: {}", e)))?;

        trace!("BM25 returned {} hits", results.len());
        Ok(results
            .into_iter()
            .map(|r| ScoredChunk::new(r.doc_id, r.score))
            .collect())
    }

    async fn health(&self) -> CapabilityResult<()> {
        if self.index.is_empty() {
            Err(CapabilityError::unavailable("sparse", "BM25 index is empty"))
        } else {
            Ok(())
        }
    }
}
