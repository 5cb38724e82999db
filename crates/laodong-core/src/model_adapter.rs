//! Adapter layer for laodong-model infrastructure.
//!
//! Bridges the HTTP model clients to the core capability traits:
//!
//! - error conversion from `ModelError` to `LaodongError` (startup) and to
//!   `CapabilityError` (per call)
//! - request conversion from [`GenerationRequest`] to chat messages
//! - wrapper types implementing [`Embedder`], [`Reranker`] and [`Generator`]
//!
//! ## Architecture
//!
//! ```text
//! laodong-core pipeline (router, retriever, reranker, engine)
//!        ↓
//!   model_adapter (this module) - wrappers + conversions
//!        ↓
//!     laodong-model clients (embeddings, rerank, chat completions)
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use laodong_model::{
    ChatCompletionClient, ChatMessage, EmbeddingConfig, GenerationConfig, HttpEmbeddingModel,
    HttpRerankerModel, ModelError, RerankerConfig,
};

use crate::capabilities::{
    CapabilityError, CapabilityResult, Embedder, GenerationRequest, Generator, Reranker,
    TokenStream,
};
use crate::errors::LaodongError;
use crate::types::Role;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a laodong-model error raised while constructing a backend.
pub fn from_model_error(err: ModelError) -> LaodongError {
    match err {
        ModelError::InvalidConfig { message } => LaodongError::invalid_configuration(
            message,
            "Check the backends section of config.yaml",
        ),
        other => LaodongError::Model(other),
    }
}

/// Convert a laodong-model error raised by a capability call.
pub fn to_capability_error(capability: &'static str, err: ModelError) -> CapabilityError {
    match &err {
        ModelError::ProviderNotAvailable { .. } | ModelError::MissingApiKey { .. } => {
            CapabilityError::unavailable(capability, err.to_string())
        }
        ModelError::InvalidResponse { .. } | ModelError::Json(_) => {
            CapabilityError::protocol(capability, err.to_string())
        }
        _ => CapabilityError::backend(capability, err.to_string()),
    }
}

/// Chat messages for a generation request: system, history, then the prompt.
pub fn to_chat_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if !request.system.is_empty() {
        messages.push(ChatMessage::system(&request.system));
    }
    for turn in &request.history {
        messages.push(match turn.role {
            Role::User => ChatMessage::user(&turn.text),
            Role::Assistant => ChatMessage::assistant(&turn.text),
        });
    }
    messages.push(ChatMessage::user(&request.prompt));
    messages
}

// ============================================================================
// Embedding
// ============================================================================

/// [`Embedder`] over an OpenAI-compatible or TEI embedding endpoint.
#[derive(Debug)]
pub struct HttpEmbedder {
    inner: HttpEmbeddingModel,
}

impl HttpEmbedder {
    pub fn new(model: HttpEmbeddingModel) -> Self {
        Self { inner: model }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, LaodongError> {
        let model = HttpEmbeddingModel::new(config.clone()).map_err(from_model_error)?;
        Ok(Self::new(model))
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        self.inner.model_id()
    }

    async fn embed(&self, text: &str) -> CapabilityResult<Vec<f32>> {
        self.inner
            .embed_one(text)
            .await
            .map_err(|e| to_capability_error("embed", e))
    }

    async fn health(&self) -> CapabilityResult<()> {
        self.inner
            .ping()
            .await
            .map_err(|e| to_capability_error("embed", e))
    }
}

// ============================================================================
// Reranking
// ============================================================================

/// [`Reranker`] over a TEI-style `/rerank` endpoint.
#[derive(Debug)]
pub struct HttpReranker {
    inner: HttpRerankerModel,
}

impl HttpReranker {
    pub fn new(model: HttpRerankerModel) -> Self {
        Self { inner: model }
    }

    pub fn from_config(config: &RerankerConfig) -> Result<Self, LaodongError> {
        let model = HttpRerankerModel::new(config.clone()).map_err(from_model_error)?;
        Ok(Self::new(model))
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    fn name(&self) -> &str {
        self.inner.model_id()
    }

    async fn rerank(&self, query: &str, passages: &[String]) -> CapabilityResult<Vec<f32>> {
        self.inner
            .score_batch(query, passages)
            .await
            .map_err(|e| to_capability_error("rerank", e))
    }

    async fn health(&self) -> CapabilityResult<()> {
        self.inner
            .ping()
            .await
            .map_err(|e| to_capability_error("rerank", e))
    }
}

// ============================================================================
// Generation
// ============================================================================

/// [`Generator`] over an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug)]
pub struct OpenAiGenerator {
    client: ChatCompletionClient,
}

impl OpenAiGenerator {
    pub fn new(client: ChatCompletionClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self, LaodongError> {
        let client = ChatCompletionClient::new(config).map_err(from_model_error)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        self.client.model()
    }

    async fn generate(&self, request: GenerationRequest) -> CapabilityResult<TokenStream> {
        let messages = to_chat_messages(&request);
        let stream = self
            .client
            .stream(&messages)
            .await
            .map_err(|e| to_capability_error("generate", e))?;
        Ok(Box::pin(
            stream.map(|item| item.map_err(|e| to_capability_error("generate", e))),
        ))
    }

    async fn health(&self) -> CapabilityResult<()> {
        self.client
            .ping()
            .await
            .map_err(|e| to_capability_error("generate", e))
    }
}
