//! Hybrid retriever: dense and sparse legs run concurrently.
//!
//! Each leg fails on its own. The caller fuses whatever succeeded.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::capabilities::{
    with_timeout, CapabilityError, Embedder, ScoredChunk, SparseSearch, VectorSearch,
};
use crate::types::{ListTag, RetrievalCandidate};

/// Why a leg produced no list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegFailure {
    TimedOut,
    Backend(String),
}

impl From<CapabilityError> for LegFailure {
    fn from(e: CapabilityError) -> Self {
        if e.is_timeout() {
            Self::TimedOut
        } else {
            Self::Backend(e.to_string())
        }
    }
}

impl fmt::Display for LegFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timed out"),
            Self::Backend(reason) => write!(f, "{}", reason),
        }
    }
}

/// Outcome of one retrieval leg.
#[derive(Debug, Clone, PartialEq)]
pub enum LegOutcome {
    Ok(Vec<RetrievalCandidate>),
    Failed(LegFailure),
}

impl LegOutcome {
    /// Candidates, empty for a failed leg.
    pub fn candidates(&self) -> &[RetrievalCandidate] {
        match self {
            Self::Ok(list) => list,
            Self::Failed(_) => &[],
        }
    }

    pub fn failure(&self) -> Option<&LegFailure> {
        match self {
            Self::Ok(_) => None,
            Self::Failed(f) => Some(f),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Both legs of one retrieval call.
#[derive(Debug, Clone)]
pub struct HybridRetrieval {
    pub dense: LegOutcome,
    pub sparse: LegOutcome,
    pub dense_elapsed: Duration,
    pub sparse_elapsed: Duration,
}

impl HybridRetrieval {
    /// Both legs failed.
    pub fn all_failed(&self) -> bool {
        !self.dense.is_ok() && !self.sparse.is_ok()
    }

    /// No candidates from either leg, failed or not.
    pub fn is_empty(&self) -> bool {
        self.dense.candidates().is_empty() && self.sparse.candidates().is_empty()
    }
}

/// Per-call timeouts of the three retrieval capabilities.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalTimeouts {
    pub embed: Duration,
    pub dense: Duration,
    pub sparse: Duration,
}

pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorSearch>,
    sparse: Arc<dyn SparseSearch>,
    timeouts: RetrievalTimeouts,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorSearch>,
        sparse: Arc<dyn SparseSearch>,
        timeouts: RetrievalTimeouts,
    ) -> Self {
        Self {
            embedder,
            vector,
            sparse,
            timeouts,
        }
    }

    /// Run both legs concurrently and wait for both.
    pub async fn retrieve(&self, query: &str, k_dense: usize, k_sparse: usize) -> HybridRetrieval {
        let ((dense, dense_elapsed), (sparse, sparse_elapsed)) = tokio::join!(
            timed(self.dense_leg(query, k_dense)),
            timed(self.sparse_leg(query, k_sparse)),
        );

        if let LegOutcome::Failed(reason) = &dense {
            warn!("Dense retrieval failed ({}), continuing with sparse list", reason);
        }
        if let LegOutcome::Failed(reason) = &sparse {
            warn!("Sparse retrieval failed ({}), continuing with dense list", reason);
        }
        debug!(
            "Retrieved {} dense in {:?}, {} sparse in {:?}",
            dense.candidates().len(),
            dense_elapsed,
            sparse.candidates().len(),
            sparse_elapsed
        );

        HybridRetrieval {
            dense,
            sparse,
            dense_elapsed,
            sparse_elapsed,
        }
    }

    async fn dense_leg(&self, query: &str, k: usize) -> LegOutcome {
        let result = async {
            let vector = with_timeout("embed", self.timeouts.embed, self.embedder.embed(query)).await?;
            with_timeout(
                "dense",
                self.timeouts.dense,
                self.vector.vector_search(&vector, k),
            )
            .await
        }
        .await;

        match result {
            Ok(hits) => LegOutcome::Ok(to_candidates(hits, ListTag::Dense, k)),
            Err(e) => LegOutcome::Failed(e.into()),
        }
    }

    async fn sparse_leg(&self, query: &str, k: usize) -> LegOutcome {
        match with_timeout(
            "sparse",
            self.timeouts.sparse,
            self.sparse.sparse_search(query, k),
        )
        .await
        {
            Ok(hits) => LegOutcome::Ok(to_candidates(hits, ListTag::Sparse, k)),
            Err(e) => LegOutcome::Failed(e.into()),
        }
    }
}

async fn timed<F: std::future::Future>(fut: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let out = fut.await;
    (out, start.elapsed())
}

/// Backend hits to candidates: first occurrence wins, ranks 1..n, at most `k`.
pub fn to_candidates(hits: Vec<ScoredChunk>, list: ListTag, k: usize) -> Vec<RetrievalCandidate> {
    let mut seen = HashSet::with_capacity(hits.len());
    hits.into_iter()
        .filter(|hit| seen.insert(hit.chunk_id.clone()))
        .take(k)
        .enumerate()
        .map(|(i, hit)| RetrievalCandidate {
            chunk_id: hit.chunk_id,
            score: hit.score,
            list,
            rank: i + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityResult;
    use async_trait::async_trait;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _: &str) -> CapabilityResult<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct Hits {
        ids: Vec<&'static str>,
        delay: Duration,
        fail: bool,
    }

    impl Hits {
        fn results(&self, k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
            if self.fail {
                return Err(CapabilityError::backend("search", "connection refused"));
            }
            Ok(self
                .ids
                .iter()
                .take(k)
                .enumerate()
                .map(|(i, id)| ScoredChunk::new(*id, 1.0 / (i + 1) as f32))
                .collect())
        }
    }

    #[async_trait]
    impl VectorSearch for Hits {
        fn name(&self) -> &str {
            "hits"
        }

        async fn vector_search(&self, _: &[f32], k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
            tokio::time::sleep(self.delay).await;
            self.results(k)
        }
    }

    #[async_trait]
    impl SparseSearch for Hits {
        fn name(&self) -> &str {
            "hits"
        }

        async fn sparse_search(&self, _: &str, k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
            tokio::time::sleep(self.delay).await;
            self.results(k)
        }
    }

    fn hits(ids: &[&'static str]) -> Arc<Hits> {
        Arc::new(Hits {
            ids: ids.to_vec(),
            delay: Duration::ZERO,
            fail: false,
        })
    }

    fn retriever(dense: Arc<Hits>, sparse: Arc<Hits>) -> HybridRetriever {
        HybridRetriever::new(
            Arc::new(FixedEmbedder),
            dense,
            sparse,
            RetrievalTimeouts {
                embed: Duration::from_millis(100),
                dense: Duration::from_millis(100),
                sparse: Duration::from_millis(100),
            },
        )
    }

    fn ids(outcome: &LegOutcome) -> Vec<&str> {
        outcome.candidates().iter().map(|c| c.chunk_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_both_legs() {
        let r = retriever(hits(&["a", "b"]), hits(&["b", "c"]));
        let result = r.retrieve("q", 15, 15).await;
        assert_eq!(ids(&result.dense), vec!["a", "b"]);
        assert_eq!(ids(&result.sparse), vec!["b", "c"]);
        assert_eq!(result.sparse.candidates()[1].rank, 2);
        assert_eq!(result.sparse.candidates()[1].list, ListTag::Sparse);
    }

    #[tokio::test]
    async fn test_sparse_timeout_keeps_dense() {
        let slow = Arc::new(Hits {
            ids: vec!["s"],
            delay: Duration::from_secs(5),
            fail: false,
        });
        let result = retriever(hits(&["d"]), slow).retrieve("q", 15, 15).await;
        assert_eq!(ids(&result.dense), vec!["d"]);
        assert_eq!(result.sparse.failure(), Some(&LegFailure::TimedOut));
        assert!(!result.all_failed());
    }

    #[tokio::test]
    async fn test_legs_run_concurrently() {
        let slow = |ids: &[&'static str]| {
            Arc::new(Hits {
                ids: ids.to_vec(),
                delay: Duration::from_millis(80),
                fail: false,
            })
        };
        let start = Instant::now();
        let result = retriever(slow(&["a"]), slow(&["b"])).retrieve("q", 15, 15).await;
        assert!(result.dense.is_ok() && result.sparse.is_ok());
        assert!(start.elapsed() < Duration::from_millis(155));
    }

    #[tokio::test]
    async fn test_both_fail() {
        let failing = || {
            Arc::new(Hits {
                ids: vec![],
                delay: Duration::ZERO,
                fail: true,
            })
        };
        let result = retriever(failing(), failing()).retrieve("q", 15, 15).await;
        assert!(result.all_failed());
        assert!(result.is_empty());
        assert!(matches!(result.dense.failure(), Some(LegFailure::Backend(_))));
    }

    #[test]
    fn test_to_candidates_dedupes_and_reranks() {
        let hits = vec![
            ScoredChunk::new("a", 0.9),
            ScoredChunk::new("a", 0.8),
            ScoredChunk::new("b", 0.7),
            ScoredChunk::new("c", 0.6),
        ];
        let candidates = to_candidates(hits, ListTag::Dense, 2);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].chunk_id.as_str(), "b");
        assert_eq!(candidates[1].rank, 2);
    }
}
