//! HTTP embedding client.
//!
//! Speaks either the text-embeddings-inference protocol (`POST /embed` with
//! `{"inputs": [...]}`) or the OpenAI one (`POST /embeddings`).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::{resolve_api_key, EmbeddingApi, EmbeddingConfig};
use crate::error::{check_status, ModelError, ModelResult};
use crate::{endpoint, http_client};

#[derive(Serialize)]
struct TeiRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding model served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingModel {
    http: reqwest::Client,
    config: EmbeddingConfig,
    api_key: Option<String>,
}

impl HttpEmbeddingModel {
    /// Create a client. The API key is optional for local TEI servers.
    pub fn new(config: EmbeddingConfig) -> ModelResult<Self> {
        if config.dimension == 0 {
            return Err(ModelError::InvalidConfig {
                message: "embedding dimension must be greater than zero".to_string(),
            });
        }

        let api_key = resolve_api_key(
            &config.model_id,
            config.api_key_env.as_deref(),
            config.api == EmbeddingApi::OpenAi,
        )?;

        info!(
            "Embedding backend: {} ({}) at {}",
            config.model_id, config.api, config.base_url
        );

        Ok(Self {
            http: http_client()?,
            config,
            api_key,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Embed a batch of texts, one vector per input in input order.
    pub async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        trace!("Embedding {} texts with {}", texts.len(), self.config.model_id);

        let vectors = match self.config.api {
            EmbeddingApi::Tei => self.embed_tei(texts).await?,
            EmbeddingApi::OpenAi => self.embed_openai(texts).await?,
        };

        if vectors.len() != texts.len() {
            return Err(ModelError::embedding_failed(
                &self.config.model_id,
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.config.dimension) {
            return Err(ModelError::embedding_failed(
                &self.config.model_id,
                format!(
                    "expected dimension {}, got {}",
                    self.config.dimension,
                    bad.len()
                ),
            ));
        }

        debug!("Embedded {} texts", vectors.len());
        Ok(vectors)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> ModelResult<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ModelError::embedding_failed(&self.config.model_id, "empty response"))
    }

    async fn embed_tei(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        let url = endpoint(&self.config.base_url, "embed");
        let response = self
            .authorized(self.http.post(&url))
            .json(&TeiRequest {
                inputs: texts,
                truncate: true,
            })
            .send()
            .await
            .map_err(|e| ModelError::unavailable(&self.config.model_id, e.to_string()))?;

        let response = check_status(&self.config.model_id, response).await?;
        response
            .json::<Vec<Vec<f32>>>()
            .await
            .map_err(|e| ModelError::invalid_response(&self.config.model_id, e.to_string()))
    }

    async fn embed_openai(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        let url = endpoint(&self.config.base_url, "embeddings");
        let response = self
            .authorized(self.http.post(&url))
            .json(&OpenAiRequest {
                model: &self.config.model_id,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| ModelError::unavailable(&self.config.model_id, e.to_string()))?;

        let response = check_status(&self.config.model_id, response).await?;
        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::invalid_response(&self.config.model_id, e.to_string()))?;

        Ok(order_by_index(parsed.data))
    }

    /// Check that the endpoint answers.
    pub async fn ping(&self) -> ModelResult<()> {
        let path = match self.config.api {
            EmbeddingApi::Tei => "health",
            EmbeddingApi::OpenAi => "models",
        };
        let response = self
            .authorized(self.http.get(endpoint(&self.config.base_url, path)))
            .send()
            .await
            .map_err(|e| ModelError::unavailable(&self.config.model_id, e.to_string()))?;
        check_status(&self.config.model_id, response).await?;
        Ok(())
    }

    /// Configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Model identifier.
    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }
}

/// OpenAI does not promise response order; restore it from `index`.
fn order_by_index(mut data: Vec<OpenAiEmbedding>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}
