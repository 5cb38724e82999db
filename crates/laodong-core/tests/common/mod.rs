//! Shared capability doubles for laodong-core integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use laodong_core::{
    Capabilities, CapabilityError, CapabilityResult, Chunk, ChunkId, Corpus, Embedder,
    GenerationRequest, Generator, LaodongConfig, Provision, Reranker, ScoredChunk, SparseSearch,
    TokenStream, VectorSearch,
};

// ============================================================================
// Corpus
// ============================================================================

/// A one-chunk provision of the 2019 Labor Code.
pub fn chunk(id: &str, article: &str, title: &str, text: &str) -> Chunk {
    Chunk {
        id: ChunkId::new(id),
        provision: Arc::new(Provision {
            id: format!("blld-2019-{}", article),
            source_code: "45/2019/QH14".to_string(),
            article: article.to_string(),
            text: text.to_string(),
            chapter: Some("X".to_string()),
            section: None,
            doc_type: Some("Bộ luật".to_string()),
            doc_name: Some("Bộ luật Lao động".to_string()),
            short_name: Some("BLLĐ 2019".to_string()),
            article_title: Some(title.to_string()),
            effective_date: Some("01/01/2021".to_string()),
            status: Some("còn hiệu lực".to_string()),
            references: Vec::new(),
        }),
        text: text.to_string(),
    }
}

/// Articles 139 (maternity), 46 (severance) and 75 (apprenticeship).
pub fn corpus() -> Arc<Corpus> {
    Arc::new(Corpus::from_chunks(vec![
        chunk(
            "139-1",
            "139",
            "Nghỉ thai sản",
            "Lao động nữ được nghỉ thai sản trước và sau khi sinh con là 06 tháng.",
        ),
        chunk(
            "46-1",
            "46",
            "Trợ cấp thôi việc",
            "Người sử dụng lao động có trách nhiệm trả trợ cấp thôi việc cho người lao động.",
        ),
        chunk(
            "75-1",
            "75",
            "Học nghề",
            "Người sử dụng lao động tuyển người vào học nghề để làm việc cho mình.",
        ),
    ]))
}

fn hits(ids: &[&str]) -> Vec<ScoredChunk> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| ScoredChunk::new(*id, 1.0 - i as f32 * 0.1))
        .collect()
}

// ============================================================================
// Embedding and search
// ============================================================================

pub struct StaticEmbedder;

#[async_trait]
impl Embedder for StaticEmbedder {
    fn name(&self) -> &str {
        "static"
    }

    async fn embed(&self, _text: &str) -> CapabilityResult<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _text: &str) -> CapabilityResult<Vec<f32>> {
        Err(CapabilityError::unavailable("embed", "connection refused"))
    }

    async fn health(&self) -> CapabilityResult<()> {
        Err(CapabilityError::unavailable("embed", "connection refused"))
    }
}

/// Returns the same ranked list for every query, after an optional delay.
pub struct ScriptedVectorSearch {
    pub ids: Vec<&'static str>,
    pub delay: Duration,
}

impl ScriptedVectorSearch {
    pub fn new(ids: &[&'static str]) -> Self {
        Self {
            ids: ids.to_vec(),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl VectorSearch for ScriptedVectorSearch {
    fn name(&self) -> &str {
        "scripted-dense"
    }

    async fn vector_search(&self, _vector: &[f32], k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
        tokio::time::sleep(self.delay).await;
        Ok(hits(&self.ids).into_iter().take(k).collect())
    }
}

/// Returns the same ranked list for every query, after an optional delay.
pub struct ScriptedSparseSearch {
    pub ids: Vec<&'static str>,
    pub delay: Duration,
}

impl ScriptedSparseSearch {
    pub fn new(ids: &[&'static str]) -> Self {
        Self {
            ids: ids.to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(ids: &[&'static str], delay: Duration) -> Self {
        Self {
            ids: ids.to_vec(),
            delay,
        }
    }
}

#[async_trait]
impl SparseSearch for ScriptedSparseSearch {
    fn name(&self) -> &str {
        "scripted-sparse"
    }

    async fn sparse_search(&self, _query: &str, k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
        tokio::time::sleep(self.delay).await;
        Ok(hits(&self.ids).into_iter().take(k).collect())
    }
}

pub struct FailingSparseSearch;

#[async_trait]
impl SparseSearch for FailingSparseSearch {
    fn name(&self) -> &str {
        "failing-sparse"
    }

    async fn sparse_search(&self, _query: &str, _k: usize) -> CapabilityResult<Vec<ScoredChunk>> {
        Err(CapabilityError::backend("sparse", "index unavailable"))
    }
}

// ============================================================================
// Reranking
// ============================================================================

/// Scores a passage by the first needle it contains; unmatched passages get 0.
pub struct KeywordReranker {
    pub scores: Vec<(&'static str, f32)>,
}

#[async_trait]
impl Reranker for KeywordReranker {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn rerank(&self, _query: &str, passages: &[String]) -> CapabilityResult<Vec<f32>> {
        Ok(passages
            .iter()
            .map(|p| {
                self.scores
                    .iter()
                    .find(|(needle, _)| p.contains(needle))
                    .map(|(_, score)| *score)
                    .unwrap_or(0.0)
            })
            .collect())
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Streams fixed tokens and records every request it receives.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub tokens: Vec<String>,
    pub token_delay: Duration,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn slow(tokens: &[&str], token_delay: Duration) -> Self {
        Self {
            token_delay,
            ..Self::new(tokens)
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> GenerationRequest {
        self.requests().pop().expect("generator was called")
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> CapabilityResult<TokenStream> {
        self.requests.lock().unwrap().push(request);
        let delay = self.token_delay;
        let stream = futures::stream::unfold(self.tokens.clone().into_iter(), move |mut rest| async move {
            let token = rest.next()?;
            tokio::time::sleep(delay).await;
            Some((Ok(token), rest))
        });
        Ok(Box::pin(stream))
    }
}

/// Fails before producing any token.
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _request: GenerationRequest) -> CapabilityResult<TokenStream> {
        Err(CapabilityError::backend("generate", "HTTP 503"))
    }

    async fn health(&self) -> CapabilityResult<()> {
        Err(CapabilityError::unavailable("generate", "HTTP 503"))
    }
}

/// Endless token stream that counts how many tokens were pulled.
#[derive(Default)]
pub struct CountingGenerator {
    pub pulls: Arc<AtomicUsize>,
}

impl CountingGenerator {
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(&self, _request: GenerationRequest) -> CapabilityResult<TokenStream> {
        let pulls = self.pulls.clone();
        let stream = futures::stream::unfold(pulls, |pulls| async move {
            let n = pulls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            Some((Ok(format!("t{} ", n)), pulls))
        });
        Ok(Box::pin(stream))
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Short timeouts so failure paths finish quickly.
pub fn test_config() -> LaodongConfig {
    let mut config = LaodongConfig::default();
    config.timeouts.embed_ms = 500;
    config.timeouts.dense_ms = 500;
    config.timeouts.sparse_ms = 100;
    config.timeouts.rerank_ms = 500;
    config.timeouts.first_token_ms = 2000;
    config.timeouts.idle_token_ms = 2000;
    config.timeouts.rewrite_ms = 500;
    config.timeouts.router_ms = 500;
    config
}

/// Healthy doubles over [`corpus`]: dense ranks 139, 46, 75 and sparse ranks 139, 75.
pub fn capabilities(generator: Arc<dyn Generator>) -> Capabilities {
    Capabilities {
        embedder: Arc::new(StaticEmbedder),
        vector: Arc::new(ScriptedVectorSearch::new(&["139-1", "46-1", "75-1"])),
        sparse: Arc::new(ScriptedSparseSearch::new(&["139-1", "75-1"])),
        reranker: None,
        generator,
        chunks: corpus(),
    }
}
