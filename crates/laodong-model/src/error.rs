//! Error types for laodong-model.
//!
//! Errors name the model and endpoint involved so a failing backend can be
//! identified from a single log line.

use thiserror::Error;

/// Result type alias for laodong-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in laodong-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Configuration errors
    // ========================================================================
    /// A required API key environment variable is not set.
    #[error("API key for '{provider}' not found. Set the {env_var} environment variable.")]
    MissingApiKey { provider: String, env_var: String },

    /// Model configuration is invalid.
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// The endpoint could not be reached.
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable { provider: String, reason: String },

    /// The endpoint answered with a non-success HTTP status.
    #[error("'{model_id}' returned HTTP {status}: {body}")]
    Status {
        model_id: String,
        status: u16,
        body: String,
    },

    /// The endpoint answered with a body we could not interpret.
    #[error("'{model_id}' returned an invalid response: {message}")]
    InvalidResponse { model_id: String, message: String },

    // ========================================================================
    // Inference errors
    // ========================================================================
    /// Embedding generation failed.
    #[error("Embedding failed for model '{model_id}': {message}")]
    EmbeddingFailed { model_id: String, message: String },

    /// Reranking failed.
    #[error("Reranking failed for model '{model_id}': {message}")]
    RerankingFailed { model_id: String, message: String },

    /// Generation failed before or during streaming.
    #[error("Generation failed for model '{model_id}': {message}")]
    GenerationFailed { model_id: String, message: String },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create a provider-not-available error.
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderNotAvailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-response error.
    pub fn invalid_response(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create an embedding failed error.
    pub fn embedding_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a reranking failed error.
    pub fn reranking_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RerankingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a generation failed error.
    pub fn generation_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from the network layer rather than the model.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotAvailable { .. } | Self::Status { .. }
        )
    }
}

/// Turn a non-success response into [`ModelError::Status`].
pub(crate) async fn check_status(
    model_id: &str,
    response: reqwest::Response,
) -> ModelResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ModelError::Status {
        model_id: model_id.to_string(),
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
