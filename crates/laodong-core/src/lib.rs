//! # laodong-core
//!
//! Retrieval, fusion, reranking and routing for Vietnamese labor-law
//! questions, with conversational memory.
//!
//! ## Main Types
//!
//! - [`ConversationEngine`] – runs turns and owns session memory
//! - [`Capabilities`] – the embedding, search, rerank and generation backends
//! - [`LaodongConfig`] – configuration loaded from `~/.laodong/config.yaml`
//! - [`LaodongError`] / [`TurnError`] – startup errors and terminal turn errors
//!
//! ## Modules
//!
//! - [`router`] – LEGAL / CHAT intent routing
//! - [`rewriter`] – follow-up condensing for the legal path
//! - [`retriever`] – concurrent dense and sparse retrieval
//! - [`fusion`] – reciprocal rank fusion
//! - [`reranker`] – cross-encoder reranking with fusion-order fallback
//! - [`session`] – per-session locking and token-budget eviction
//! - [`engine`] – turn orchestration and streaming
//!
//! ## Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use laodong_core::{ConversationEngine, LaodongConfig, TurnEvent};
//!
//! let config = LaodongConfig::load_default()?;
//! let engine = ConversationEngine::from_config(config)?;
//!
//! let mut turn = engine.submit_turn("s1", "Điều 139 quy định gì về thai sản?");
//! while let Some(event) = turn.next().await {
//!     match event {
//!         TurnEvent::Token { text } => print!("{}", text),
//!         TurnEvent::Citations { citations, .. } => println!("\n{} citations", citations.len()),
//!         TurnEvent::Error { error } => eprintln!("{}", error),
//!     }
//! }
//! ```

// Modules
pub mod bm25;
pub mod capabilities;
pub mod citations;
pub mod config;
pub mod corpus;
pub mod db_adapter;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod legal;
pub mod model_adapter;
pub mod prompt;
pub mod reranker;
pub mod retriever;
pub mod rewriter;
pub mod router;
pub mod session;
pub mod tokens;
pub mod types;

// Re-exports for convenience
pub use bm25::{Bm25Config, Bm25Index, Bm25Retriever, Bm25SearchResult, Tokenizer as Bm25Tokenizer};
pub use capabilities::{
    Capabilities, CapabilityError, CapabilityResult, ChunkLookup, Embedder, GenerationRequest,
    Generator, Reranker, ScoredChunk, SparseSearch, TokenStream, VectorSearch,
};
pub use citations::build_citations;
pub use config::{
    BackendsConfig, CorpusConfig, DenseBackendConfig, DenseBackendKind, FusionConfig,
    LaodongConfig, RerankerStageConfig, RetrievalConfig, RewriterConfig, RewriterStrategy,
    RouterConfig, RouterStrategy, SessionConfig, TimeoutConfig,
};
pub use corpus::Corpus;
pub use engine::{
    build_capabilities, CapabilityHealth, ConversationEngine, HealthReport, TurnDebugInfo,
    TurnEvent, TurnOutcome, TurnStream,
};
pub use errors::{LaodongError, LaodongResult, TurnError};
pub use fusion::fuse;
pub use reranker::{PassageReranker, RerankOutcome, RerankStatus};
pub use retriever::{HybridRetrieval, HybridRetriever, LegFailure, LegOutcome};
pub use rewriter::{QueryRewriter, RewriteFallback, RewriteOutcome};
pub use router::{CategoryScores, IntentClassifier, QueryRouter};
pub use session::{ConversationSession, SessionStore};
pub use types::{
    Chunk, ChunkId, Citation, ConversationTurn, FusedResult, IntentCategory, ListTag, Provision,
    RerankedResult, RetrievalCandidate, Role, RouterDecision,
};

// laodong-db adapter - dense search backends
pub use db_adapter::{from_db_error, MemoryVectorSearch, QdrantVectorSearch};

// laodong-model adapter - embedding, rerank and generation backends
pub use model_adapter::{from_model_error, HttpEmbedder, HttpReranker, OpenAiGenerator};
