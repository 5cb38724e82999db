//! Reciprocal Rank Fusion (RRF) of the dense and sparse lists.
//!
//! Formula: `RRF(d) = 1 / (k + rank_dense) + 1 / (k + rank_sparse)`
//!
//! A list that does not contain the chunk contributes nothing. Raw backend
//! scores are ignored: only ranks matter, so cosine similarities and BM25
//! scores never need to share a scale.
//!
//! Ordering is total and deterministic: fused score descending, then dense
//! rank, then sparse rank (absent ranks last), then chunk id ascending.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{ChunkId, FusedResult, RetrievalCandidate};

/// Fuse two rank-ordered candidate lists and keep the best `top_n`.
///
/// `rrf_k` must be positive (enforced by config validation). Candidate ranks
/// are taken as given; a chunk repeated within one list keeps its best rank.
///
/// ```
/// use laodong_core::fusion::fuse;
/// use laodong_core::types::{ListTag, RetrievalCandidate};
///
/// let a = |list, rank| RetrievalCandidate { chunk_id: "A".into(), score: 1.0, list, rank };
/// let fused = fuse(&[a(ListTag::Dense, 1)], &[a(ListTag::Sparse, 1)], 60.0, 15);
/// assert!((fused[0].score - 0.03279).abs() < 1e-5);
/// ```
pub fn fuse(
    dense: &[RetrievalCandidate],
    sparse: &[RetrievalCandidate],
    rrf_k: f64,
    top_n: usize,
) -> Vec<FusedResult> {
    debug_assert!(rrf_k > 0.0, "rrf_k must be positive");

    let dense_ranks = best_ranks(dense);
    let sparse_ranks = best_ranks(sparse);

    let mut fused: Vec<FusedResult> = dense_ranks
        .keys()
        .chain(sparse_ranks.keys())
        .copied()
        .collect::<std::collections::BTreeSet<&ChunkId>>()
        .into_iter()
        .map(|chunk_id| {
            let dense_rank = dense_ranks.get(chunk_id).copied();
            let sparse_rank = sparse_ranks.get(chunk_id).copied();
            FusedResult {
                chunk_id: chunk_id.clone(),
                score: contribution(dense_rank, rrf_k) + contribution(sparse_rank, rrf_k),
                rank: 0,
                dense_rank,
                sparse_rank,
            }
        })
        .collect();

    fused.sort_by(compare_fused);
    fused.truncate(top_n);
    for (i, result) in fused.iter_mut().enumerate() {
        result.rank = i + 1;
    }
    fused
}

/// `1 / (rank + k)` for a present rank, 0 otherwise.
#[inline]
pub fn contribution(rank: Option<usize>, rrf_k: f64) -> f64 {
    match rank {
        Some(rank) => 1.0 / (rank as f64 + rrf_k),
        None => 0.0,
    }
}

fn best_ranks(list: &[RetrievalCandidate]) -> HashMap<&ChunkId, usize> {
    let mut ranks: HashMap<&ChunkId, usize> = HashMap::with_capacity(list.len());
    for candidate in list {
        ranks
            .entry(&candidate.chunk_id)
            .and_modify(|r| *r = (*r).min(candidate.rank))
            .or_insert(candidate.rank);
    }
    ranks
}

fn compare_fused(a: &FusedResult, b: &FusedResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| compare_rank(a.dense_rank, b.dense_rank))
        .then_with(|| compare_rank(a.sparse_rank, b.sparse_rank))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Smaller rank first; an absent rank sorts after any present one.
fn compare_rank(a: Option<usize>, b: Option<usize>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
