//! Configuration types for laodong-model.
//!
//! These are the canonical backend settings. `laodong-core` embeds them in its
//! own YAML config rather than defining duplicates.
//!
//! API keys never live in the config file. Each section names the
//! environment variable that holds its key.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::{DEFAULT_EMBEDDING_MODEL_ID, DEFAULT_RERANKER_MODEL_ID};

// ============================================================================
// API key resolution
// ============================================================================

/// Read an API key from the named environment variable.
///
/// Returns `Ok(None)` when no variable is configured. Returns
/// [`ModelError::MissingApiKey`] when the key is `required` but unset or empty.
pub fn resolve_api_key(
    provider: &str,
    env_var: Option<&str>,
    required: bool,
) -> ModelResult<Option<String>> {
    let Some(var) = env_var else {
        return Ok(None);
    };

    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
        _ if required => Err(ModelError::MissingApiKey {
            provider: provider.to_string(),
            env_var: var.to_string(),
        }),
        _ => Ok(None),
    }
}

// ============================================================================
// EmbeddingConfig
// ============================================================================

/// Wire protocol spoken by the embedding endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingApi {
    /// HuggingFace text-embeddings-inference (`POST /embed`).
    #[default]
    Tei,
    /// OpenAI-compatible (`POST /embeddings`).
    OpenAi,
}

impl std::fmt::Display for EmbeddingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tei => write!(f, "tei"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Configuration for the embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Endpoint protocol.
    #[serde(default)]
    pub api: EmbeddingApi,

    /// Base URL, without the operation path.
    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    /// Model ID sent to OpenAI-compatible endpoints and used in logs.
    #[serde(default = "default_embedding_model_id")]
    pub model_id: String,

    /// Expected vector dimension. Responses of another size are rejected.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_embedding_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_embedding_model_id() -> String {
    DEFAULT_EMBEDDING_MODEL_ID.to_string()
}

fn default_dimension() -> usize {
    768
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api: EmbeddingApi::default(),
            base_url: default_embedding_url(),
            model_id: default_embedding_model_id(),
            dimension: default_dimension(),
            api_key_env: None,
        }
    }
}

// ============================================================================
// RerankerConfig
// ============================================================================

/// Configuration for a TEI-style `/rerank` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankerConfig {
    /// Base URL, without the operation path.
    #[serde(default = "default_reranker_url")]
    pub base_url: String,

    /// Model ID used in logs.
    #[serde(default = "default_reranker_model_id")]
    pub model_id: String,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_reranker_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_reranker_model_id() -> String {
    DEFAULT_RERANKER_MODEL_ID.to_string()
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: default_reranker_url(),
            model_id: default_reranker_model_id(),
            api_key_env: None,
        }
    }
}

// ============================================================================
// GenerationConfig
// ============================================================================

/// Hosted chat-completion provider. All speak the OpenAI wire format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    #[default]
    Groq,
    OpenAi,
    Gemini,
    /// Any other OpenAI-compatible server; `baseUrl` and `model` are required.
    Custom,
}

impl GenerationProvider {
    /// Default API base URL.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            Self::Custom => None,
        }
    }

    /// Default model name.
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("llama-3.3-70b-versatile"),
            Self::OpenAi => Some("gpt-4o-mini"),
            Self::Gemini => Some("gemini-2.5-flash-latest"),
            Self::Custom => None,
        }
    }

    /// Default API key variable.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("GROQ_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Custom => None,
        }
    }
}

impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Groq => write!(f, "groq"),
            Self::OpenAi => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "custom" => Ok(Self::Custom),
            _ => Err(format!(
                "Unknown provider: '{}'. Use 'groq', 'openai', 'gemini' or 'custom'.",
                s
            )),
        }
    }
}

/// Configuration for the chat-completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Provider preset.
    #[serde(default)]
    pub provider: GenerationProvider,

    /// Overrides the provider's base URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Overrides the provider's default model.
    #[serde(default)]
    pub model: Option<String>,

    /// Overrides the provider's API key variable.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.05
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::default(),
            base_url: None,
            model: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl GenerationConfig {
    /// Base URL after applying the override.
    pub fn effective_base_url(&self) -> ModelResult<String> {
        self.base_url
            .clone()
            .or_else(|| self.provider.default_base_url().map(str::to_string))
            .ok_or_else(|| ModelError::InvalidConfig {
                message: format!("provider '{}' requires backends.generation.baseUrl", self.provider),
            })
    }

    /// Model name after applying the override.
    pub fn effective_model(&self) -> ModelResult<String> {
        self.model
            .clone()
            .or_else(|| self.provider.default_model().map(str::to_string))
            .ok_or_else(|| ModelError::InvalidConfig {
                message: format!("provider '{}' requires backends.generation.model", self.provider),
            })
    }

    /// API key variable after applying the override.
    pub fn effective_api_key_env(&self) -> Option<String> {
        self.api_key_env
            .clone()
            .or_else(|| self.provider.default_api_key_env().map(str::to_string))
    }
}
