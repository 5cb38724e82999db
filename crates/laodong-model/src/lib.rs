//! # laodong-model
//!
//! Inference layer for laodong: embeddings, reranking and streaming generation.
//!
//! Every model runs behind an HTTP endpoint. This crate owns the wire formats:
//!
//! - **Embedding**: HuggingFace text-embeddings-inference (`/embed`) or an
//!   OpenAI-compatible `/embeddings` endpoint
//! - **Reranking**: a TEI-style cross-encoder `/rerank` endpoint
//! - **Generation**: OpenAI-compatible `/chat/completions` with SSE streaming,
//!   which covers Groq, OpenAI and Gemini's compatibility layer
//!
//! ## Design Principles
//!
//! 1. **Production-only**: no mock implementations. Test doubles live in consuming crates.
//! 2. **No pipeline policy**: timeouts, fallbacks and ordering belong to `laodong-core`.
//! 3. **Keys from the environment**: configs name a variable, never a secret.
//!
//! ## Usage
//!
//! ```ignore
//! use futures::StreamExt;
//! use laodong_model::{ChatCompletionClient, ChatMessage, GenerationConfig};
//!
//! let client = ChatCompletionClient::new(&GenerationConfig::default())?;
//! let mut tokens = client.stream(&[ChatMessage::user("Xin chào")]).await?;
//! while let Some(token) = tokens.next().await {
//!     print!("{}", token?);
//! }
//! ```

pub mod config;
pub mod error;

mod embedding;
mod generation;
mod reranker;

// Re-export error types
pub use error::{ModelError, ModelResult};

// Re-export config types (canonical source of truth)
pub use config::{
    resolve_api_key, EmbeddingApi, EmbeddingConfig, GenerationConfig, GenerationProvider,
    RerankerConfig,
};

pub use embedding::HttpEmbeddingModel;
pub use generation::{token_stream, ChatCompletionClient, ChatMessage, ChatRole, TokenStream};
pub use reranker::HttpRerankerModel;

// Default model IDs (full HuggingFace identifiers)
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "AITeamVN/Vietnamese_Embedding";
pub const DEFAULT_RERANKER_MODEL_ID: &str = "BAAI/bge-reranker-v2-m3";

/// Build the shared HTTP client used by every backend.
pub(crate) fn http_client() -> ModelResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("laodong/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ModelError::InvalidConfig {
            message: format!("Failed to build HTTP client: {}", e),
        })
}

/// Join a base URL and an operation path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        assert_eq!(endpoint("http://h:8080/", "/embed"), "http://h:8080/embed");
        assert_eq!(
            endpoint("https://api.groq.com/openai/v1", "chat/completions"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
