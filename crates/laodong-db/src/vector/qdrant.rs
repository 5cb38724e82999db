//! Qdrant REST client for dense search.
//!
//! Only the two calls the pipeline needs are implemented: nearest-neighbor
//! search on a collection and a collection lookup used as a health probe.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use super::VectorHit;
use crate::error::{DbError, DbResult};

const STORE_NAME: &str = "qdrant";

/// Connection settings for a Qdrant collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QdrantConfig {
    /// Base URL of the Qdrant HTTP API.
    #[serde(default = "default_url")]
    pub url: String,

    /// Collection holding the chunk embeddings.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Environment variable holding the API key, if the cluster requires one.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,

    /// Payload field carrying the chunk id. Falls back to the point id.
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

fn default_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "legal_decrees_vL".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("QDRANT_API_KEY".to_string())
}

fn default_id_field() -> String {
    "chunk_id".to_string()
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            collection: default_collection(),
            api_key_env: default_api_key_env(),
            id_field: default_id_field(),
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

/// Async REST client bound to one collection.
#[derive(Debug, Clone)]
pub struct QdrantClient {
    http: reqwest::Client,
    config: QdrantConfig,
    api_key: Option<String>,
}

impl QdrantClient {
    /// Create a client, resolving the API key from the configured environment variable.
    pub fn new(config: QdrantConfig) -> DbResult<Self> {
        if config.collection.trim().is_empty() {
            return Err(DbError::Config {
                message: "qdrant collection name cannot be empty".to_string(),
            });
        }

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DbError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/collections/{}",
            self.config.url.trim_end_matches('/'),
            self.config.collection
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    /// Nearest-neighbor search, best first.
    pub async fn search(&self, vector: &[f32], limit: usize) -> DbResult<Vec<VectorHit>> {
        trace!("Qdrant search on {}, limit={}", self.config.collection, limit);

        let url = format!("{}/points/search", self.collection_url());
        let request = self.authorized(self.http.post(&url)).json(&SearchRequest {
            vector,
            limit,
            with_payload: true,
        });

        let response = request
            .send()
            .await
            .map_err(|e| DbError::unreachable(STORE_NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DbError::Status {
                store: STORE_NAME.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| DbError::invalid_response(STORE_NAME, e.to_string()))?;

        let hits = parsed
            .result
            .into_iter()
            .map(|point| VectorHit {
                chunk_id: chunk_id_of(&point, &self.config.id_field),
                score: point.score,
            })
            .collect::<Vec<_>>();

        debug!("Qdrant returned {} hits", hits.len());
        Ok(hits)
    }

    /// Check that the collection exists and the server answers.
    pub async fn ping(&self) -> DbResult<()> {
        let response = self
            .authorized(self.http.get(self.collection_url()))
            .send()
            .await
            .map_err(|e| DbError::unreachable(STORE_NAME, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DbError::Status {
                store: STORE_NAME.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    /// Collection name.
    pub fn collection(&self) -> &str {
        &self.config.collection
    }
}

fn chunk_id_of(point: &ScoredPoint, id_field: &str) -> String {
    let from_payload = point
        .payload
        .as_ref()
        .and_then(|p| p.get(id_field))
        .and_then(value_as_id);

    from_payload
        .or_else(|| value_as_id(&point.id))
        .unwrap_or_default()
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
