//! Cross-encoder reranking of the fused candidates.
//!
//! The fused list is scored passage by passage against the query and sorted
//! by relevance. Anything that goes wrong (timeout, backend error, a score
//! count that does not match the passages) falls back to fusion order. The
//! caller never sees a rerank failure, only [`RerankStatus::FellBack`].

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::capabilities::{with_timeout, ChunkLookup, Reranker};
use crate::types::{Chunk, FusedResult, RerankedResult};

/// How the final ordering was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerankStatus {
    /// Reranker scores decided the order.
    Reranked,
    /// Reranking is disabled; fusion order is final.
    Disabled,
    /// The reranker failed; fusion order is final.
    FellBack(String),
}

impl RerankStatus {
    pub fn fell_back(&self) -> bool {
        matches!(self, Self::FellBack(_))
    }
}

/// Output of the rerank stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankOutcome {
    pub results: Vec<RerankedResult>,
    pub status: RerankStatus,
}

/// Rerank stage: passage lookup, truncation, scoring and fallback.
pub struct PassageReranker {
    reranker: Option<Arc<dyn Reranker>>,
    chunks: Arc<dyn ChunkLookup>,
    top_n: usize,
    max_passage_chars: usize,
    timeout: Duration,
}

impl PassageReranker {
    pub fn new(
        reranker: Option<Arc<dyn Reranker>>,
        chunks: Arc<dyn ChunkLookup>,
        top_n: usize,
        max_passage_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            reranker,
            chunks,
            top_n,
            max_passage_chars,
            timeout,
        }
    }

    /// Rerank fused candidates, keeping at most `top_n`.
    ///
    /// Candidates whose chunk is missing from the lookup are dropped: they
    /// could never be shown or cited.
    pub async fn rerank(&self, query: &str, fused: &[FusedResult]) -> RerankOutcome {
        let present: Vec<(FusedResult, Arc<Chunk>)> = fused
            .iter()
            .filter_map(|f| match self.chunks.chunk(f.chunk_id.as_str()) {
                Some(chunk) => Some((f.clone(), chunk)),
                None => {
                    warn!("Fused candidate `{}` not found in corpus, dropping", f.chunk_id);
                    None
                }
            })
            .collect();
        let candidates: Vec<FusedResult> = present.iter().map(|(f, _)| f.clone()).collect();

        let Some(reranker) = &self.reranker else {
            return RerankOutcome {
                results: fallback_order(&candidates, self.top_n),
                status: RerankStatus::Disabled,
            };
        };

        if candidates.is_empty() {
            return RerankOutcome {
                results: Vec::new(),
                status: RerankStatus::Reranked,
            };
        }

        let passages: Vec<String> = present
            .iter()
            .map(|(_, chunk)| rerank_input(chunk, self.max_passage_chars))
            .collect();

        debug!(
            "Reranking {} candidates with {} (keep {})",
            passages.len(),
            reranker.name(),
            self.top_n
        );

        let scores =
            match with_timeout("rerank", self.timeout, reranker.rerank(query, &passages)).await {
                Ok(scores) => scores,
                Err(e) => return self.fall_back(&candidates, e.to_string()),
            };

        if scores.len() != candidates.len() {
            return self.fall_back(
                &candidates,
                format!(
                    "reranker returned {} scores for {} passages",
                    scores.len(),
                    candidates.len()
                ),
            );
        }

        RerankOutcome {
            results: order_by_scores(&candidates, &scores, self.top_n),
            status: RerankStatus::Reranked,
        }
    }

    fn fall_back(&self, candidates: &[FusedResult], reason: String) -> RerankOutcome {
        warn!("Rerank failed, using fusion order: {}", reason);
        RerankOutcome {
            results: fallback_order(candidates, self.top_n),
            status: RerankStatus::FellBack(reason),
        }
    }
}

/// Passage sent to the cross-encoder: provision label, then the chunk text.
fn rerank_input(chunk: &Chunk, max_chars: usize) -> String {
    let passage = format!("{}\n{}", chunk.provision.label(), chunk.text);
    truncate_passage(&passage, max_chars)
}

/// Sort candidates by reranker score, descending.
///
/// `candidates` must be in fused order. Equal scores keep fused order and
/// NaN scores sort last.
pub fn order_by_scores(
    candidates: &[FusedResult],
    scores: &[f32],
    top_n: usize,
) -> Vec<RerankedResult> {
    let mut scored: Vec<(&FusedResult, f32)> = candidates.iter().zip(scores.iter().copied()).collect();

    scored.sort_by(|(fa, sa), (fb, sb)| {
        compare_scores(*sa, *sb).then_with(|| fa.rank.cmp(&fb.rank))
    });

    scored
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (fused, score))| RerankedResult {
            chunk_id: fused.chunk_id.clone(),
            score,
            rank: i + 1,
            fused_rank: fused.rank,
            reranked: true,
        })
        .collect()
}

/// Descending, with NaN after every number.
fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

/// Fusion order truncated to `top_n`, marked as not reranked.
pub fn fallback_order(candidates: &[FusedResult], top_n: usize) -> Vec<RerankedResult> {
    candidates
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(i, fused)| RerankedResult {
            chunk_id: fused.chunk_id.clone(),
            score: fused.score as f32,
            rank: i + 1,
            fused_rank: fused.rank,
            reranked: false,
        })
        .collect()
}

/// Cut a passage to at most `max_chars` characters.
///
/// Prefers the last sentence end (`.`, `!`, `?`, `;`, `:` followed by
/// whitespace, or a newline) in the second half of the window, then the last
/// whitespace, then a hard cut.
pub fn truncate_passage(text: &str, max_chars: usize) -> String {
    let Some((window_end, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let window = &text[..window_end];
    let min_keep = window
        .char_indices()
        .nth(max_chars / 2)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut sentence_end = None;
    let mut chars = window.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let end = i + c.len_utf8();
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' | ';' | ':' => chars
                .peek()
                .map_or(end == window.len() && next_is_space(text, end), |(_, n)| n.is_whitespace()),
            _ => false,
        };
        if boundary && end >= min_keep {
            sentence_end = Some(end);
        }
    }

    if let Some(end) = sentence_end {
        return window[..end].trim_end().to_string();
    }

    match window.rfind(char::is_whitespace) {
        Some(i) if i >= min_keep => window[..i].trim_end().to_string(),
        _ => window.to_string(),
    }
}

fn next_is_space(text: &str, byte_idx: usize) -> bool {
    text[byte_idx..].chars().next().is_some_and(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityError, CapabilityResult};
    use crate::types::{ChunkId, Provision};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn fused(ids: &[&str]) -> Vec<FusedResult> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| FusedResult {
                chunk_id: ChunkId::from(*id),
                score: 1.0 / (61.0 + i as f64),
                rank: i + 1,
                dense_rank: Some(i + 1),
                sparse_rank: None,
            })
            .collect()
    }

    fn ids(results: &[RerankedResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk_id.as_str()).collect()
    }

    // ========================================================================
    // Test doubles
    // ========================================================================

    struct Lookup(HashMap<String, Arc<Chunk>>);

    impl Lookup {
        fn with(ids: &[&str]) -> Arc<Self> {
            let provision = Arc::new(Provision {
                id: "p".to_string(),
                source_code: "45/2019/QH14".to_string(),
                article: "139".to_string(),
                text: String::new(),
                chapter: None,
                section: None,
                doc_type: None,
                doc_name: None,
                short_name: None,
                article_title: None,
                effective_date: None,
                status: None,
                references: Vec::new(),
            });
            Arc::new(Self(
                ids.iter()
                    .map(|id| {
                        (
                            id.to_string(),
                            Arc::new(Chunk {
                                id: ChunkId::from(*id),
                                provision: Arc::clone(&provision),
                                text: format!("passage {}", id),
                            }),
                        )
                    })
                    .collect(),
            ))
        }
    }

    impl ChunkLookup for Lookup {
        fn chunk(&self, id: &str) -> Option<Arc<Chunk>> {
            self.0.get(id).cloned()
        }

        fn len(&self) -> usize {
            self.0.len()
        }
    }

    struct ScriptedReranker {
        result: CapabilityResult<Vec<f32>>,
        delay: Duration,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedReranker {
        fn scores(scores: Vec<f32>) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(scores),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Reranker for ScriptedReranker {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn rerank(&self, _query: &str, passages: &[String]) -> CapabilityResult<Vec<f32>> {
            self.seen.lock().unwrap().extend(passages.iter().cloned());
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    fn stage(reranker: Option<Arc<dyn Reranker>>, lookup: Arc<Lookup>) -> PassageReranker {
        PassageReranker::new(reranker, lookup, 7, 2000, Duration::from_millis(200))
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    #[test]
    fn test_reorders_by_score() {
        let results = order_by_scores(&fused(&["A", "B", "C"]), &[0.2, 0.9, 0.5], 7);
        assert_eq!(ids(&results), vec!["B", "C", "A"]);
        assert_eq!(results[0].fused_rank, 2);
        assert_eq!(results[0].rank, 1);
        assert!(results.iter().all(|r| r.reranked));
    }

    #[test]
    fn test_ties_keep_fused_order() {
        let results = order_by_scores(&fused(&["A", "B", "C", "D"]), &[0.5, 0.7, 0.5, 0.7], 7);
        assert_eq!(ids(&results), vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn test_nan_sorts_last() {
        let results = order_by_scores(&fused(&["A", "B", "C"]), &[f32::NAN, -3.0, 0.1], 7);
        assert_eq!(ids(&results), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_truncates_to_top_n() {
        let results = order_by_scores(&fused(&["A", "B", "C"]), &[0.1, 0.2, 0.3], 2);
        assert_eq!(ids(&results), vec!["C", "B"]);
        assert_eq!(fallback_order(&fused(&["A", "B", "C"]), 2).len(), 2);
    }

    // ========================================================================
    // Truncation
    // ========================================================================

    #[test]
    fn test_short_passage_unchanged() {
        assert_eq!(truncate_passage("Điều 139. Nghỉ thai sản.", 2000), "Điều 139. Nghỉ thai sản.");
    }

    #[test]
    fn test_truncates_at_sentence_boundary() {
        let text = "Câu thứ nhất khá dài. Câu thứ hai cũng dài. Câu thứ ba bị cắt ở giữa";
        let cut = truncate_passage(text, 50);
        assert_eq!(cut, "Câu thứ nhất khá dài. Câu thứ hai cũng dài.");
        assert!(cut.chars().count() <= 50);
    }

    #[test]
    fn test_truncates_at_whitespace_without_sentence_end() {
        let text = "một hai ba bốn năm sáu bảy tám chín mười";
        let cut = truncate_passage(text, 20);
        assert!(cut.chars().count() <= 20);
        assert!(text.starts_with(&cut));
        assert!(!cut.ends_with(' '));
        assert_eq!(cut, "một hai ba bốn năm");
    }

    #[test]
    fn test_hard_cut_single_word() {
        let text = "a".repeat(30);
        assert_eq!(truncate_passage(&text, 10), "a".repeat(10));
    }

    #[test]
    fn test_decimal_point_is_not_sentence_end() {
        let text = "Mức hưởng 1.5 lần lương cơ sở và thêm phụ cấp khác nữa";
        let cut = truncate_passage(text, 30);
        assert!(!cut.ends_with("1."));
    }

    // ========================================================================
    // Stage
    // ========================================================================

    #[tokio::test]
    async fn test_stage_reranks() {
        let reranker = ScriptedReranker::scores(vec![0.2, 0.9, 0.5]);
        let stage = stage(Some(reranker.clone()), Lookup::with(&["A", "B", "C"]));

        let outcome = stage.rerank("thai sản", &fused(&["A", "B", "C"])).await;
        assert_eq!(outcome.status, RerankStatus::Reranked);
        assert_eq!(ids(&outcome.results), vec!["B", "C", "A"]);

        let seen = reranker.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].starts_with("Điều 139"));
        assert!(seen[0].ends_with("passage A"));
    }

    #[tokio::test]
    async fn test_stage_falls_back_on_error() {
        let reranker = Arc::new(ScriptedReranker {
            result: Err(CapabilityError::backend("rerank", "503")),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        });
        let stage = stage(Some(reranker), Lookup::with(&["A", "B", "C"]));

        let outcome = stage.rerank("q", &fused(&["A", "B", "C"])).await;
        assert!(outcome.status.fell_back());
        assert_eq!(ids(&outcome.results), vec!["A", "B", "C"]);
        assert!(outcome.results.iter().all(|r| !r.reranked));
    }

    #[tokio::test]
    async fn test_stage_falls_back_on_timeout() {
        let reranker = Arc::new(ScriptedReranker {
            result: Ok(vec![0.1, 0.9]),
            delay: Duration::from_secs(5),
            seen: Mutex::new(Vec::new()),
        });
        let stage = stage(Some(reranker), Lookup::with(&["A", "B"]));

        let outcome = stage.rerank("q", &fused(&["A", "B"])).await;
        assert!(matches!(outcome.status, RerankStatus::FellBack(ref r) if r.contains("timed out")));
        assert_eq!(ids(&outcome.results), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_stage_falls_back_on_count_mismatch() {
        let stage = stage(
            Some(ScriptedReranker::scores(vec![0.9])),
            Lookup::with(&["A", "B"]),
        );
        let outcome = stage.rerank("q", &fused(&["A", "B"])).await;
        assert!(outcome.status.fell_back());
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn test_stage_disabled_uses_fusion_order() {
        let ids_in: Vec<String> = (0..10).map(|i| format!("c{}", i)).collect();
        let refs: Vec<&str> = ids_in.iter().map(String::as_str).collect();
        let stage = stage(None, Lookup::with(&refs));

        let outcome = stage.rerank("q", &fused(&refs)).await;
        assert_eq!(outcome.status, RerankStatus::Disabled);
        assert_eq!(outcome.results.len(), 7);
        assert_eq!(outcome.results[0].chunk_id.as_str(), "c0");
    }

    #[tokio::test]
    async fn test_stage_drops_unknown_chunks() {
        let stage = stage(
            Some(ScriptedReranker::scores(vec![0.3, 0.4])),
            Lookup::with(&["A", "C"]),
        );
        let outcome = stage.rerank("q", &fused(&["A", "B", "C"])).await;
        assert_eq!(outcome.status, RerankStatus::Reranked);
        assert_eq!(ids(&outcome.results), vec!["C", "A"]);
    }
}
