//! Capability interfaces consumed by the pipeline.
//!
//! - [`Embedder`]: text to vector
//! - [`VectorSearch`]: nearest neighbours over chunk vectors
//! - [`SparseSearch`]: lexical relevance over chunk text
//! - [`Reranker`]: per-passage relevance scores
//! - [`Generator`]: cancellable token stream
//! - [`ChunkLookup`]: chunk id to chunk text and provision
//!
//! Implementations are selected from config at startup (see `model_adapter`,
//! `db_adapter` and `bm25`). The traits hold no pipeline policy: timeouts and
//! fallbacks are applied by the callers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use thiserror::Error;

use crate::types::{Chunk, ChunkId, ConversationTurn};

// ============================================================================
// CapabilityError
// ============================================================================

/// Failure of a single capability call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The call exceeded its timeout.
    #[error("{capability} timed out after {elapsed_ms} ms")]
    Timeout {
        capability: &'static str,
        elapsed_ms: u64,
    },

    /// The backend could not be reached or is not configured.
    #[error("{capability} unavailable: {reason}")]
    Unavailable {
        capability: &'static str,
        reason: String,
    },

    /// The backend reported an error.
    #[error("{capability} failed: {reason}")]
    Backend {
        capability: &'static str,
        reason: String,
    },

    /// The backend answered with something we could not use.
    #[error("{capability} returned malformed output: {reason}")]
    Protocol {
        capability: &'static str,
        reason: String,
    },
}

impl CapabilityError {
    pub fn unavailable(capability: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            capability,
            reason: reason.into(),
        }
    }

    pub fn backend(capability: &'static str, reason: impl Into<String>) -> Self {
        Self::Backend {
            capability,
            reason: reason.into(),
        }
    }

    pub fn protocol(capability: &'static str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            capability,
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for capability calls.
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Stream of generated text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = CapabilityResult<String>> + Send>>;

/// Run a capability call under its own timeout.
pub async fn with_timeout<T, F>(
    capability: &'static str,
    limit: Duration,
    call: F,
) -> CapabilityResult<T>
where
    F: Future<Output = CapabilityResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout {
            capability,
            elapsed_ms: limit.as_millis() as u64,
        }),
    }
}

/// Drain a token stream into one string. Used for non-streamed completions.
pub async fn collect_text(mut stream: TokenStream) -> CapabilityResult<String> {
    let mut text = String::new();
    while let Some(token) = stream.next().await {
        text.push_str(&token?);
    }
    Ok(text)
}

// ============================================================================
// Search results
// ============================================================================

/// One hit from a search backend, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: ChunkId,
    pub score: f32,
}

impl ScoredChunk {
    pub fn new(chunk_id: impl Into<ChunkId>, score: f32) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            score,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Text embedding.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Backend name for logs and health reports.
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> CapabilityResult<Vec<f32>>;

    /// Reachability probe.
    async fn health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

/// Dense nearest-neighbour search.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Return at most `k` chunks ordered by similarity, best first.
    async fn vector_search(&self, vector: &[f32], k: usize) -> CapabilityResult<Vec<ScoredChunk>>;

    async fn health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

/// Lexical search.
#[async_trait]
pub trait SparseSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Return at most `k` chunks ordered by lexical relevance, best first.
    async fn sparse_search(&self, query: &str, k: usize) -> CapabilityResult<Vec<ScoredChunk>>;

    async fn health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

/// Cross-encoder relevance scoring.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// Score each passage against the query, in input order.
    async fn rerank(&self, query: &str, passages: &[String]) -> CapabilityResult<Vec<f32>>;

    async fn health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

/// Input to a generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    /// System instructions, including retrieved provisions on the legal path.
    pub system: String,
    /// Prior turns, oldest first.
    pub history: Vec<ConversationTurn>,
    /// The current user message.
    pub prompt: String,
}

impl GenerationRequest {
    /// A request with no history.
    pub fn single(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            prompt: prompt.into(),
        }
    }
}

/// Streaming text generation.
///
/// Dropping the returned stream cancels generation: implementations must not
/// pull further tokens from the backend after that.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerationRequest) -> CapabilityResult<TokenStream>;

    async fn health(&self) -> CapabilityResult<()> {
        Ok(())
    }
}

/// Read-only access to chunk text and provision metadata.
pub trait ChunkLookup: Send + Sync {
    fn chunk(&self, id: &str) -> Option<Arc<Chunk>>;

    /// Number of chunks available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Capabilities bundle
// ============================================================================

/// Every backend the engine talks to.
#[derive(Clone)]
pub struct Capabilities {
    pub embedder: Arc<dyn Embedder>,
    pub vector: Arc<dyn VectorSearch>,
    pub sparse: Arc<dyn SparseSearch>,
    /// `None` when reranking is disabled.
    pub reranker: Option<Arc<dyn Reranker>>,
    pub generator: Arc<dyn Generator>,
    pub chunks: Arc<dyn ChunkLookup>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("embedder", &self.embedder.name())
            .field("vector", &self.vector.name())
            .field("sparse", &self.sparse.name())
            .field("reranker", &self.reranker.as_ref().map(|r| r.name().to_string()))
            .field("generator", &self.generator.name())
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: CapabilityResult<()> = with_timeout("sparse", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result,
            Err(CapabilityError::Timeout {
                capability: "sparse",
                elapsed_ms: 10
            })
        );
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok = with_timeout("embed", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: CapabilityResult<()> = with_timeout("embed", Duration::from_secs(1), async {
            Err(CapabilityError::backend("embed", "boom"))
        })
        .await;
        assert!(matches!(err, Err(CapabilityError::Backend { .. })));
    }

    #[tokio::test]
    async fn test_collect_text() {
        let stream: TokenStream = Box::pin(futures::stream::iter(vec![
            Ok("Xin ".to_string()),
            Ok("chào".to_string()),
        ]));
        assert_eq!(collect_text(stream).await.unwrap(), "Xin chào");

        let failing: TokenStream = Box::pin(futures::stream::iter(vec![
            Ok("a".to_string()),
            Err(CapabilityError::backend("generate", "reset")),
        ]));
        assert!(collect_text(failing).await.is_err());
    }

    #[test]
    fn test_error_display() {
        let err = CapabilityError::Timeout {
            capability: "rerank",
            elapsed_ms: 8000,
        };
        assert_eq!(err.to_string(), "rerank timed out after 8000 ms");
        assert!(err.is_timeout());
    }
}
