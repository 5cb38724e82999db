//! HTTP cross-encoder reranker client (TEI `/rerank`).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::{resolve_api_key, RerankerConfig};
use crate::error::{check_status, ModelError, ModelResult};
use crate::{endpoint, http_client};

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct RankedText {
    index: usize,
    score: f32,
}

/// Cross-encoder served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRerankerModel {
    http: reqwest::Client,
    config: RerankerConfig,
    api_key: Option<String>,
}

impl HttpRerankerModel {
    pub fn new(config: RerankerConfig) -> ModelResult<Self> {
        let api_key = resolve_api_key(&config.model_id, config.api_key_env.as_deref(), false)?;
        info!("Reranker backend: {} at {}", config.model_id, config.base_url);

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

    /// Score each passage against the query. Scores come back in input order.
    pub async fn score_batch(&self, query: &str, passages: &[String]) -> ModelResult<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        trace!("Reranking {} passages", passages.len());

        let response = self
            .authorized(self.http.post(endpoint(&self.config.base_url, "rerank")))
            .json(&RerankRequest {
                query,
                texts: passages,
                truncate: true,
            })
            .send()
            .await
            .map_err(|e| ModelError::unavailable(&self.config.model_id, e.to_string()))?;

        let response = check_status(&self.config.model_id, response).await?;
        let ranked: Vec<RankedText> = response
            .json()
            .await
            .map_err(|e| ModelError::invalid_response(&self.config.model_id, e.to_string()))?;

        let scores = scores_in_input_order(&self.config.model_id, passages.len(), ranked)?;
        debug!("Reranked {} passages", scores.len());
        Ok(scores)
    }

    /// Check that the endpoint answers.
    pub async fn ping(&self) -> ModelResult<()> {
        let response = self
            .authorized(self.http.get(endpoint(&self.config.base_url, "health")))
            .send()
            .await
            .map_err(|e| ModelError::unavailable(&self.config.model_id, e.to_string()))?;
        check_status(&self.config.model_id, response).await?;
        Ok(())
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }
}

/// TEI returns results sorted by score; put them back in passage order.
fn scores_in_input_order(
    model_id: &str,
    expected: usize,
    ranked: Vec<RankedText>,
) -> ModelResult<Vec<f32>> {
    if ranked.len() != expected {
        return Err(ModelError::reranking_failed(
            model_id,
            format!("expected {} scores, got {}", expected, ranked.len()),
        ));
    }

    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for item in ranked {
        let Some(slot) = scores.get_mut(item.index) else {
            return Err(ModelError::reranking_failed(
                model_id,
                format!("index {} out of range", item.index),
            ));
        };
        if slot.is_some() {
            return Err(ModelError::reranking_failed(
                model_id,
                format!("duplicate index {}", item.index),
            ));
        }
        *slot = Some(item.score);
    }

    // Every slot is filled: count matched and no index repeated.
    Ok(scores.into_iter().map(|s| s.unwrap_or(f32::NAN)).collect())
}
