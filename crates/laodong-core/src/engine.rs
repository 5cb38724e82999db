//! Conversational engine: the orchestrator for every turn.
//!
//! ```text
//! submit_turn(session, text)
//!   → lock session (IDLE → PROCESSING)
//!   → router ──CHAT──────────────────────────────┐
//!        └─LEGAL→ rewriter → retriever → fuse → rerank
//!                                                 ↓
//!                             prompt → generate (streamed)
//!   → commit user + assistant turns, evict to budget
//!   → Citations event, unlock (PROCESSING → IDLE)
//! ```
//!
//! Retrieval and rerank failures degrade the turn. Only generation failures
//! and a busy session reach the caller, as the final [`TurnEvent::Error`].
//! Dropping the [`TurnStream`] cancels the turn: no more tokens are pulled
//! and nothing is committed.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use laodong_db::vector::{load_vector_records, MemoryVectorIndex};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bm25::{Bm25Index, Bm25Retriever};
use crate::capabilities::{
    with_timeout, Capabilities, CapabilityError, CapabilityResult, ChunkLookup, GenerationRequest,
    Reranker,
};
use crate::citations::build_citations;
use crate::config::{DenseBackendKind, LaodongConfig};
use crate::corpus::Corpus;
use crate::db_adapter::{from_db_error, MemoryVectorSearch, QdrantVectorSearch};
use crate::errors::{LaodongError, LaodongResult, TurnError};
use crate::fusion::fuse;
use crate::model_adapter::{HttpEmbedder, HttpReranker, OpenAiGenerator};
use crate::prompt::{
    chat_request, degraded_request, history_within_budget, legal_request, EMPTY_ANSWER_FALLBACK,
    NO_GROUNDING_DISCLAIMER,
};
use crate::reranker::PassageReranker;
use crate::retriever::{HybridRetriever, LegFailure, RetrievalTimeouts};
use crate::rewriter::QueryRewriter;
use crate::router::QueryRouter;
use crate::session::SessionStore;
use crate::types::{Chunk, Citation, ConversationTurn, IntentCategory, RerankedResult};

/// Buffered events between the turn task and the caller.
const EVENT_BUFFER: usize = 64;

/// Upper bound on the idle-session sweep interval.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Events
// ============================================================================

/// One event of a turn stream. The last event is `Citations` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TurnEvent {
    /// A fragment of the answer.
    Token { text: String },
    /// The answer completed and was committed.
    Citations {
        category: IntentCategory,
        grounded: bool,
        citations: Vec<Citation>,
    },
    /// The turn failed and was not committed.
    Error { error: TurnError },
}

/// Events of one turn. Dropping it cancels the turn.
pub struct TurnStream {
    rx: mpsc::Receiver<TurnEvent>,
}

impl Stream for TurnStream {
    type Item = TurnEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// A fully drained turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub answer: String,
    pub category: Option<IntentCategory>,
    pub grounded: bool,
    pub citations: Vec<Citation>,
    pub error: Option<TurnError>,
}

impl TurnStream {
    /// Drain the stream into one outcome.
    pub async fn collect_outcome(mut self) -> TurnOutcome {
        let mut outcome = TurnOutcome::default();
        while let Some(event) = self.next().await {
            match event {
                TurnEvent::Token { text } => outcome.answer.push_str(&text),
                TurnEvent::Citations {
                    category,
                    grounded,
                    citations,
                } => {
                    outcome.category = Some(category);
                    outcome.grounded = grounded;
                    outcome.citations = citations;
                }
                TurnEvent::Error { error } => outcome.error = Some(error),
            }
        }
        outcome
    }
}

// ============================================================================
// Debug info
// ============================================================================

/// Milliseconds spent per stage of one turn.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub route_ms: u64,
    pub rewrite_ms: u64,
    pub dense_ms: u64,
    pub sparse_ms: u64,
    pub rerank_ms: u64,
    pub generate_ms: u64,
    pub total_ms: u64,
}

/// Per-turn record, logged at debug level.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnDebugInfo {
    pub session_id: String,
    pub category: Option<IntentCategory>,
    pub router_confidence: f32,
    pub router_reason: String,
    pub rewritten_query: Option<String>,
    pub rewrite_fallback: Option<String>,
    pub dense_count: usize,
    pub sparse_count: usize,
    pub dense_failure: Option<String>,
    pub sparse_failure: Option<String>,
    pub fused_count: usize,
    pub reranked_count: usize,
    pub rerank_fell_back: bool,
    pub degraded: bool,
    pub timings: StageTimings,
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

// ============================================================================
// Health
// ============================================================================

/// Reachability of one capability backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityHealth {
    pub capability: String,
    pub backend: String,
    pub healthy: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub capabilities: Vec<CapabilityHealth>,
    pub chunks: usize,
    pub sessions: usize,
}

impl HealthReport {
    /// Every capability is reachable.
    pub fn is_healthy(&self) -> bool {
        self.capabilities.iter().all(|c| c.healthy)
    }
}

async fn probe<F>(capability: &str, backend: &str, limit: Duration, call: F) -> CapabilityHealth
where
    F: std::future::Future<Output = CapabilityResult<()>>,
{
    let start = Instant::now();
    let result = with_timeout("health", limit, call).await;
    CapabilityHealth {
        capability: capability.to_string(),
        backend: backend.to_string(),
        healthy: result.is_ok(),
        latency_ms: millis(start.elapsed()),
        error: result.err().map(|e| e.to_string()),
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Load the corpus and construct every backend named in `config.backends`.
pub fn build_capabilities(config: &LaodongConfig) -> LaodongResult<Capabilities> {
    let path = config.corpus.path.as_ref().ok_or_else(|| {
        LaodongError::invalid_configuration(
            "corpus.path is not set",
            "Pass --corpus or set LAODONG_CORPUS",
        )
    })?;

    let corpus = Arc::new(Corpus::load(path)?);
    info!(
        "Loaded corpus {}: {} chunks, {} provisions",
        path.display(),
        corpus.len(),
        corpus.provision_count()
    );

    let bm25 = Bm25Index::build(&config.retrieval.bm25, corpus.sparse_documents());
    info!(
        "Built BM25 index: {} documents, {} terms",
        bm25.num_documents(),
        bm25.vocabulary_size()
    );

    let embedder = Arc::new(HttpEmbedder::from_config(&config.backends.embedding)?);

    let vector: Arc<dyn crate::capabilities::VectorSearch> = match config.backends.dense.kind {
        DenseBackendKind::Memory => {
            let records = match &config.backends.dense.vectors_path {
                Some(vectors) => load_vector_records(vectors).map_err(from_db_error)?,
                None if corpus.has_vectors() => corpus.vector_records(),
                None => return Err(LaodongError::CorpusMissingVectors { path: path.clone() }),
            };
            let index = MemoryVectorIndex::from_records(records, config.backends.dense.metric)
                .map_err(from_db_error)?;
            if index.dimension() != embedder.dimension() {
                warn!(
                    "Corpus vectors have dimension {} but the embedding model returns {}",
                    index.dimension(),
                    embedder.dimension()
                );
            }
            info!("Built in-memory vector index: {} vectors", index.len());
            Arc::new(MemoryVectorSearch::new(Arc::new(index)))
        }
        DenseBackendKind::Qdrant => {
            let search = QdrantVectorSearch::from_config(&config.backends.dense.qdrant)?;
            info!("Using Qdrant collection {}", config.backends.dense.qdrant.collection);
            Arc::new(search)
        }
    };

    let reranker: Option<Arc<dyn Reranker>> = if config.reranker.enabled {
        Some(Arc::new(HttpReranker::from_config(&config.backends.reranker)?))
    } else {
        None
    };

    let generator = Arc::new(OpenAiGenerator::from_config(&config.backends.generation)?);

    Ok(Capabilities {
        embedder,
        vector,
        sparse: Arc::new(Bm25Retriever::new(bm25)),
        reranker,
        generator,
        chunks: corpus,
    })
}

// ============================================================================
// ConversationEngine
// ============================================================================

/// The turn pipeline plus the session store. Cheap to clone.
#[derive(Clone)]
pub struct ConversationEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: LaodongConfig,
    capabilities: Capabilities,
    router: QueryRouter,
    rewriter: QueryRewriter,
    retriever: HybridRetriever,
    reranker: PassageReranker,
    sessions: SessionStore,
}

/// Passages chosen for a turn.
enum Plan {
    Chat,
    Grounded {
        results: Vec<RerankedResult>,
        chunks: Vec<Arc<Chunk>>,
    },
    Degraded,
}

enum Generated {
    Completed(String),
    Cancelled,
    Failed(TurnError),
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("capabilities", &self.inner.capabilities)
            .field("router", &self.inner.router.classifier_name())
            .field("sessions", &self.inner.sessions.len())
            .finish()
    }
}

impl ConversationEngine {
    /// Create an engine over explicit capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: LaodongConfig, capabilities: Capabilities) -> LaodongResult<Self> {
        for warning in config.validate()? {
            warn!("{}", warning);
        }

        let timeouts = &config.timeouts;
        let router = QueryRouter::from_config(
            &config.router,
            capabilities.embedder.clone(),
            capabilities.generator.clone(),
            timeouts.router(),
        );
        let rewriter = QueryRewriter::new(
            &config.rewriter,
            Some(capabilities.generator.clone()),
            timeouts.rewrite(),
        );
        let retriever = HybridRetriever::new(
            capabilities.embedder.clone(),
            capabilities.vector.clone(),
            capabilities.sparse.clone(),
            RetrievalTimeouts {
                embed: timeouts.embed(),
                dense: timeouts.dense(),
                sparse: timeouts.sparse(),
            },
        );
        let reranker = PassageReranker::new(
            capabilities
                .reranker
                .clone()
                .filter(|_| config.reranker.enabled),
            capabilities.chunks.clone(),
            config.reranker.top_n,
            config.reranker.max_passage_chars,
            timeouts.rerank(),
        );
        let sessions = SessionStore::new(config.session.token_budget);

        debug!(
            "Engine ready: router={}, rewriter={:?}, {:?}",
            router.classifier_name(),
            config.rewriter.strategy,
            capabilities
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                capabilities,
                router,
                rewriter,
                retriever,
                reranker,
                sessions,
            }),
        })
    }

    /// Create an engine with the backends named in the configuration.
    pub fn from_config(config: LaodongConfig) -> LaodongResult<Self> {
        let capabilities = build_capabilities(&config)?;
        Self::new(config, capabilities)
    }

    pub fn config(&self) -> &LaodongConfig {
        &self.inner.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.inner.capabilities
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// Start a turn. Must be called inside a tokio runtime.
    pub fn submit_turn(&self, session_id: impl Into<String>, text: impl Into<String>) -> TurnStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let inner = self.inner.clone();
        let session_id = session_id.into();
        let text = text.into();
        tokio::spawn(async move { inner.run_turn(session_id, text, tx).await });
        TurnStream { rx }
    }

    /// Clear a session. Rejected while a turn is in progress.
    pub fn reset_session(&self, session_id: &str) -> LaodongResult<()> {
        self.inner.sessions.reset(session_id)
    }

    /// Committed turns of a session.
    pub async fn session_history(&self, session_id: &str) -> Option<Vec<ConversationTurn>> {
        self.inner.sessions.snapshot(session_id).await
    }

    /// Drop sessions idle longer than `session.idleTtlSecs`.
    pub fn evict_idle(&self) -> usize {
        self.inner
            .sessions
            .evict_idle(self.inner.config.session.idle_ttl())
    }

    /// Run [`evict_idle`](Self::evict_idle) periodically until the engine is dropped.
    pub fn spawn_session_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let every = self
            .inner
            .config
            .session
            .idle_ttl()
            .min(MAX_SWEEP_INTERVAL)
            .max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.sessions.evict_idle(inner.config.session.idle_ttl());
            }
        })
    }

    /// Probe every capability backend concurrently.
    pub async fn health_check(&self) -> HealthReport {
        let caps = &self.inner.capabilities;
        let timeouts = &self.inner.config.timeouts;

        let rerank = async {
            match &caps.reranker {
                Some(reranker) if self.inner.config.reranker.enabled => {
                    probe("rerank", reranker.name(), timeouts.rerank(), reranker.health()).await
                }
                _ => CapabilityHealth {
                    capability: "rerank".to_string(),
                    backend: "disabled".to_string(),
                    healthy: true,
                    latency_ms: 0,
                    error: None,
                },
            }
        };

        let (embed, dense, sparse, rerank, generate) = tokio::join!(
            probe("embed", caps.embedder.name(), timeouts.embed(), caps.embedder.health()),
            probe("dense", caps.vector.name(), timeouts.dense(), caps.vector.health()),
            probe("sparse", caps.sparse.name(), timeouts.sparse(), caps.sparse.health()),
            rerank,
            probe(
                "generate",
                caps.generator.name(),
                timeouts.first_token(),
                caps.generator.health()
            ),
        );

        HealthReport {
            capabilities: vec![embed, dense, sparse, rerank, generate],
            chunks: caps.chunks.len(),
            sessions: self.inner.sessions.len(),
        }
    }
}

impl EngineInner {
    async fn run_turn(&self, session_id: String, text: String, tx: mpsc::Sender<TurnEvent>) {
        let started = Instant::now();

        let mut guard = match self
            .sessions
            .acquire(&session_id, self.config.session.lock_wait())
            .await
        {
            Ok(guard) => guard,
            Err(error) => {
                warn!("Rejected turn: {}", error);
                let _ = tx.send(TurnEvent::Error { error }).await;
                return;
            }
        };
        let history = guard.history();

        let mut info = TurnDebugInfo {
            session_id: session_id.clone(),
            ..Default::default()
        };

        let stage = Instant::now();
        let decision = self.router.classify(&text, &history).await;
        info.timings.route_ms = millis(stage.elapsed());
        info.category = Some(decision.category);
        info.router_confidence = decision.confidence;
        info.router_reason = decision.reason.clone();

        let plan = match decision.category {
            IntentCategory::Chat => Plan::Chat,
            IntentCategory::Legal => self.plan_legal(&text, &history, &mut info).await,
        };

        let prompt_history =
            history_within_budget(&history, self.config.session.prompt_history_tokens);
        let request: GenerationRequest = match &plan {
            Plan::Chat => chat_request(&text, prompt_history),
            Plan::Grounded { chunks, .. } => {
                let passages: Vec<&Chunk> = chunks.iter().map(|c| c.as_ref()).collect();
                legal_request(&text, &passages, prompt_history)
            }
            Plan::Degraded => degraded_request(&text, prompt_history),
        };

        if matches!(plan, Plan::Degraded) {
            info.degraded = true;
            let disclaimer = TurnEvent::Token {
                text: NO_GROUNDING_DISCLAIMER.to_string(),
            };
            if tx.send(disclaimer).await.is_err() {
                debug!("Turn for session {} cancelled before generation", session_id);
                return;
            }
        }

        let stage = Instant::now();
        let generated = self.generate(request, &tx).await;
        info.timings.generate_ms = millis(stage.elapsed());
        info.timings.total_ms = millis(started.elapsed());

        let mut answer = match generated {
            Generated::Completed(answer) => answer,
            Generated::Cancelled => {
                debug!("Turn for session {} cancelled, nothing committed", session_id);
                return;
            }
            Generated::Failed(error) => {
                error!("Generation failed for session {}: {}", session_id, error);
                drop(guard);
                let _ = tx.send(TurnEvent::Error { error }).await;
                return;
            }
        };

        if answer.trim().is_empty() {
            answer = EMPTY_ANSWER_FALLBACK.to_string();
            let fallback = TurnEvent::Token {
                text: answer.clone(),
            };
            if tx.send(fallback).await.is_err() {
                return;
            }
        }

        let (grounded, citations) = match &plan {
            Plan::Grounded { results, .. } => {
                (true, build_citations(results, self.capabilities.chunks.as_ref()))
            }
            Plan::Chat | Plan::Degraded => (false, Vec::new()),
        };

        guard.append_and_evict([
            ConversationTurn::user(text),
            ConversationTurn::assistant(answer).with_citations(citations.clone()),
        ]);
        drop(guard);

        debug!(
            "Turn debug: {}",
            serde_json::to_string(&info).unwrap_or_default()
        );

        let _ = tx
            .send(TurnEvent::Citations {
                category: decision.category,
                grounded,
                citations,
            })
            .await;
    }

    /// Rewrite, retrieve, fuse and rerank.
    async fn plan_legal(
        &self,
        text: &str,
        history: &[ConversationTurn],
        info: &mut TurnDebugInfo,
    ) -> Plan {
        let stage = Instant::now();
        let rewrite = self.rewriter.rewrite(text, history).await;
        info.timings.rewrite_ms = millis(stage.elapsed());
        info.rewritten_query = rewrite.rewritten.then(|| rewrite.query.clone());
        info.rewrite_fallback = rewrite.fallback.as_ref().map(|f| f.to_string());

        let retrieval_config = &self.config.retrieval;
        let retrieval = self
            .retriever
            .retrieve(
                &rewrite.query,
                retrieval_config.dense_top_k,
                retrieval_config.sparse_top_k,
            )
            .await;
        info.timings.dense_ms = millis(retrieval.dense_elapsed);
        info.timings.sparse_ms = millis(retrieval.sparse_elapsed);
        info.dense_count = retrieval.dense.candidates().len();
        info.sparse_count = retrieval.sparse.candidates().len();
        info.dense_failure = retrieval.dense.failure().map(|f| f.to_string());
        info.sparse_failure = retrieval.sparse.failure().map(|f| f.to_string());

        if retrieval.all_failed() {
            let timed_out = [&retrieval.dense, &retrieval.sparse]
                .iter()
                .all(|leg| leg.failure() == Some(&LegFailure::TimedOut));
            if timed_out {
                warn!("RetrievalTimeout: both retrieval legs timed out, answering without grounding");
            } else {
                warn!("Both retrieval legs failed, answering without grounding");
            }
            return Plan::Degraded;
        }
        if retrieval.is_empty() {
            warn!("RetrievalEmpty: no candidates for {:?}", rewrite.query);
            return Plan::Degraded;
        }

        let fused = fuse(
            retrieval.dense.candidates(),
            retrieval.sparse.candidates(),
            retrieval_config.fusion.rrf_k,
            retrieval_config.fusion.top_n,
        );
        info.fused_count = fused.len();

        let stage = Instant::now();
        let reranked = self.reranker.rerank(&rewrite.query, &fused).await;
        info.timings.rerank_ms = millis(stage.elapsed());
        info.rerank_fell_back = reranked.status.fell_back();
        info.reranked_count = reranked.results.len();

        let chunks: Vec<Arc<Chunk>> = reranked
            .results
            .iter()
            .filter_map(|r| self.capabilities.chunks.chunk(r.chunk_id.as_str()))
            .collect();
        if chunks.is_empty() {
            warn!("RetrievalEmpty: no fused candidate resolved to a corpus chunk");
            return Plan::Degraded;
        }

        Plan::Grounded {
            results: reranked.results,
            chunks,
        }
    }

    /// Stream generation to the caller under the first-token and idle timeouts.
    async fn generate(&self, request: GenerationRequest, tx: &mpsc::Sender<TurnEvent>) -> Generated {
        let first_token = self.config.timeouts.first_token();
        let idle = self.config.timeouts.idle_token();
        let started = Instant::now();

        let opened = tokio::select! {
            biased;
            _ = tx.closed() => return Generated::Cancelled,
            opened = tokio::time::timeout(first_token, self.capabilities.generator.generate(request)) => opened,
        };
        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Generated::Failed(generation_error(e)),
            Err(_) => {
                return Generated::Failed(TurnError::GenerationTimeout {
                    elapsed_ms: millis(started.elapsed()),
                })
            }
        };

        let mut answer = String::new();
        let mut received = false;
        loop {
            let limit = if received {
                idle
            } else {
                first_token.saturating_sub(started.elapsed())
            };

            let next = tokio::select! {
                biased;
                _ = tx.closed() => return Generated::Cancelled,
                next = tokio::time::timeout(limit, stream.next()) => next,
            };

            match next {
                Ok(Some(Ok(token))) => {
                    received = true;
                    if token.is_empty() {
                        continue;
                    }
                    answer.push_str(&token);
                    if tx.send(TurnEvent::Token { text: token }).await.is_err() {
                        return Generated::Cancelled;
                    }
                }
                Ok(Some(Err(e))) => return Generated::Failed(generation_error(e)),
                Ok(None) => return Generated::Completed(answer),
                Err(_) => {
                    return Generated::Failed(TurnError::GenerationTimeout {
                        elapsed_ms: millis(started.elapsed()),
                    })
                }
            }
        }
    }
}

fn generation_error(e: CapabilityError) -> TurnError {
    match e {
        CapabilityError::Timeout { elapsed_ms, .. } => TurnError::GenerationTimeout { elapsed_ms },
        other => TurnError::Generation {
            message: other.to_string(),
        },
    }
}
