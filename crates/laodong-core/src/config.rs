//! Configuration types for laodong.
//!
//! [`LaodongConfig`] is read from `~/.laodong/config.yaml` (or an explicit
//! path). Every section and field has a default, so a missing file or a
//! partial file both yield a working configuration.
//!
//! ```yaml
//! router:
//!   strategy: lexical
//!   threshold: 0.55
//!   defaultCategory: LEGAL
//! retrieval:
//!   denseTopK: 15
//!   sparseTopK: 15
//!   fusion:
//!     rrfK: 60
//!     topN: 15
//! reranker:
//!   topN: 7
//! corpus:
//!   path: /data/laodong/corpus.jsonl
//! backends:
//!   generation:
//!     provider: groq
//!     apiKeyEnv: GROQ_API_KEY
//! ```
//!
//! API keys never live in this file: backends name an environment variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use laodong_db::vector::{QdrantConfig, VectorMetric};
use laodong_model::{EmbeddingConfig, GenerationConfig, RerankerConfig};
use serde::{Deserialize, Serialize};

use crate::bm25::Bm25Config;
use crate::errors::LaodongError;
use crate::types::IntentCategory;

// ============================================================================
// LaodongConfig
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaodongConfig {
    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub rewriter: RewriterConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub reranker: RerankerStageConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub corpus: CorpusConfig,

    #[serde(default)]
    pub backends: BackendsConfig,
}

impl LaodongConfig {
    /// Load the configuration from the default location (`~/.laodong/config.yaml`).
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LaodongError::InvalidConfig`] if the file exists but cannot be parsed.
    pub fn load_default() -> Result<Self, LaodongError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from a specific path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LaodongError::InvalidConfig`] if the file exists but cannot be parsed.
    /// Returns [`LaodongError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, LaodongError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            LaodongError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            LaodongError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Default config directory (`~/.laodong`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".laodong"))
    }

    /// Default config file path (`~/.laodong/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join("config.yaml"))
    }

    /// Serialize the effective configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, LaodongError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    ///
    /// Returns the first critical error as [`LaodongError::InvalidConfiguration`].
    /// Non-fatal issues are returned as warning strings; callers log them and
    /// proceed.
    pub fn validate(&self) -> Result<Vec<String>, LaodongError> {
        let mut all_warnings = Vec::new();

        all_warnings.extend(self.router.validate()?);
        all_warnings.extend(self.rewriter.validate()?);
        all_warnings.extend(self.retrieval.validate()?);
        all_warnings.extend(self.reranker.validate()?);
        all_warnings.extend(self.session.validate()?);
        all_warnings.extend(self.timeouts.validate()?);

        if self.reranker.enabled && self.reranker.top_n > self.retrieval.fusion.top_n {
            return Err(LaodongError::invalid_configuration(
                format!(
                    "reranker.topN ({}) exceeds retrieval.fusion.topN ({})",
                    self.reranker.top_n, self.retrieval.fusion.top_n
                ),
                "The reranker selects from the fused list; lower reranker.topN (default: 7)",
            ));
        }

        if self.corpus.path.is_none() {
            all_warnings.push(
                "corpus.path is not set; pass --corpus or set LAODONG_CORPUS before serving questions"
                    .to_string(),
            );
        }

        Ok(all_warnings)
    }
}

// ============================================================================
// Router
// ============================================================================

/// Classifier used by the query router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterStrategy {
    /// Token overlap with exemplars plus legal-signal boost. No backend calls.
    #[default]
    Lexical,
    /// Cosine similarity between embeddings of the utterance and exemplars.
    Semantic,
    /// Classification prompt sent to the generation backend.
    Llm,
}

impl std::fmt::Display for RouterStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Semantic => write!(f, "semantic"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

/// Query router configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    #[serde(default)]
    pub strategy: RouterStrategy,

    /// Decisions below this confidence resolve to `defaultCategory`.
    /// Default: 0.55
    #[serde(default = "default_router_threshold")]
    pub threshold: f32,

    /// Category used for ambiguous utterances and classifier failures.
    /// Default: LEGAL
    #[serde(default = "default_router_category")]
    pub default_category: IntentCategory,

    #[serde(default = "default_legal_exemplars")]
    pub legal_exemplars: Vec<String>,

    #[serde(default = "default_chat_exemplars")]
    pub chat_exemplars: Vec<String>,
}

fn default_router_threshold() -> f32 {
    0.55
}

fn default_router_category() -> IntentCategory {
    IntentCategory::Legal
}

fn default_legal_exemplars() -> Vec<String> {
    [
        "Người lao động được nghỉ thai sản bao lâu?",
        "Điều kiện hưởng trợ cấp thôi việc là gì?",
        "Công ty sa thải tôi như vậy có đúng luật không?",
        "Mức đóng bảo hiểm xã hội bắt buộc là bao nhiêu?",
        "Tuổi nghỉ hưu của lao động nữ là bao nhiêu?",
        "Hợp đồng lao động phải có những nội dung gì?",
        "Doanh nghiệp sáp nhập thì người lao động được hưởng quyền lợi gì?",
        "Làm thêm giờ được trả lương như thế nào?",
        "Điều kiện hưởng bảo hiểm thất nghiệp",
        "Quy định về kỷ luật lao động và xử lý vi phạm",
        "Người sử dụng lao động đơn phương chấm dứt hợp đồng",
        "Công việc độc hại được hưởng chế độ gì?",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_chat_exemplars() -> Vec<String> {
    [
        "Xin chào",
        "Chào bạn",
        "Cảm ơn bạn nhiều",
        "Bạn là ai?",
        "Bạn có thể giúp gì cho tôi?",
        "Tạm biệt",
        "Hôm nay bạn thế nào?",
        "Bạn tên là gì?",
        "Hello",
        "Ok cảm ơn",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: RouterStrategy::default(),
            threshold: default_router_threshold(),
            default_category: default_router_category(),
            legal_exemplars: default_legal_exemplars(),
            chat_exemplars: default_chat_exemplars(),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<Vec<String>, LaodongError> {
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(LaodongError::invalid_configuration(
                format!("router.threshold must be within [0, 1], got {}", self.threshold),
                "Set router.threshold between 0 and 1 (recommended: 0.55)",
            ));
        }

        if self.strategy != RouterStrategy::Llm
            && (self.legal_exemplars.is_empty() || self.chat_exemplars.is_empty())
        {
            return Err(LaodongError::invalid_configuration(
                "router exemplar sets cannot be empty",
                "Provide at least one entry in router.legalExemplars and router.chatExemplars",
            ));
        }

        if self.threshold < 0.5 {
            warnings.push(format!(
                "router.threshold={} is below 0.5; the default category will never apply",
                self.threshold
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// Rewriter
// ============================================================================

/// Query rewriting strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriterStrategy {
    /// Carry legal anchors over from recent turns. No backend calls.
    #[default]
    Heuristic,
    /// Condense prompt sent to the generation backend.
    Llm,
}

/// Query rewriter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriterConfig {
    #[serde(default)]
    pub strategy: RewriterStrategy,

    /// Number of recent exchanges (user + assistant) shown to the rewriter.
    /// Default: 3
    #[serde(default = "default_history_exchanges")]
    pub history_exchanges: usize,

    /// Each history turn is clipped to this many characters.
    /// Default: 200
    #[serde(default = "default_max_turn_chars")]
    pub max_turn_chars: usize,

    /// Maximum tokens for a rewritten query.
    /// Default: 128
    #[serde(default = "default_rewrite_token_budget")]
    pub token_budget: usize,
}

fn default_history_exchanges() -> usize {
    3
}

fn default_max_turn_chars() -> usize {
    200
}

fn default_rewrite_token_budget() -> usize {
    128
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            strategy: RewriterStrategy::default(),
            history_exchanges: default_history_exchanges(),
            max_turn_chars: default_max_turn_chars(),
            token_budget: default_rewrite_token_budget(),
        }
    }
}

impl RewriterConfig {
    pub fn validate(&self) -> Result<Vec<String>, LaodongError> {
        let mut warnings = Vec::new();

        if self.token_budget == 0 {
            return Err(LaodongError::invalid_configuration(
                "rewriter.tokenBudget cannot be 0",
                "Set tokenBudget to at least 16 (recommended: 128)",
            ));
        }

        if self.history_exchanges == 0 {
            warnings.push(
                "rewriter.historyExchanges=0 disables follow-up resolution".to_string(),
            );
        }

        Ok(warnings)
    }
}

// ============================================================================
// Retrieval
// ============================================================================

/// Reciprocal-rank fusion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionConfig {
    /// RRF constant K in `1 / (rank + K)`.
    /// Default: 60
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    /// Fused results kept for reranking.
    /// Default: 15
    #[serde(default = "default_fusion_top_n")]
    pub top_n: usize,
}

fn default_rrf_k() -> f64 {
    60.0
}

fn default_fusion_top_n() -> usize {
    15
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            top_n: default_fusion_top_n(),
        }
    }
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Default: 15
    #[serde(default = "default_top_k")]
    pub dense_top_k: usize,

    /// Default: 15
    #[serde(default = "default_top_k")]
    pub sparse_top_k: usize,

    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub bm25: Bm25Config,
}

fn default_top_k() -> usize {
    15
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_top_k: default_top_k(),
            sparse_top_k: default_top_k(),
            fusion: FusionConfig::default(),
            bm25: Bm25Config::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<Vec<String>, LaodongError> {
        let mut warnings = Vec::new();

        if self.dense_top_k == 0 {
            return Err(LaodongError::invalid_configuration(
                "retrieval.denseTopK cannot be 0",
                "Set denseTopK to at least 1 (recommended: 15)",
            ));
        }

        if self.sparse_top_k == 0 {
            return Err(LaodongError::invalid_configuration(
                "retrieval.sparseTopK cannot be 0",
                "Set sparseTopK to at least 1 (recommended: 15)",
            ));
        }

        if self.fusion.top_n == 0 {
            return Err(LaodongError::invalid_configuration(
                "retrieval.fusion.topN cannot be 0",
                "Set fusion.topN to at least 1 (recommended: 15)",
            ));
        }

        if self.fusion.rrf_k.is_nan() || self.fusion.rrf_k <= 0.0 {
            return Err(LaodongError::invalid_configuration(
                format!("retrieval.fusion.rrfK must be positive, got {}", self.fusion.rrf_k),
                "Set rrfK to a positive constant (recommended: 60)",
            ));
        }

        if self.fusion.top_n > self.dense_top_k + self.sparse_top_k {
            warnings.push(format!(
                "retrieval.fusion.topN ({}) exceeds denseTopK + sparseTopK ({}); fusion can never fill it",
                self.fusion.top_n,
                self.dense_top_k + self.sparse_top_k
            ));
        }

        if self.dense_top_k > 200 || self.sparse_top_k > 200 {
            warnings.push(
                "retrieval top-k above 200 is very large; this may impact latency".to_string(),
            );
        }

        warnings.extend(self.bm25.validate()?);

        Ok(warnings)
    }
}

// ============================================================================
// Reranker stage
// ============================================================================

/// Reranking stage configuration (the model endpoint lives under `backends`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankerStageConfig {
    /// Default: true
    #[serde(default = "default_reranker_enabled")]
    pub enabled: bool,

    /// Passages kept after reranking.
    /// Default: 7
    #[serde(default = "default_reranker_top_n")]
    pub top_n: usize,

    /// Passages longer than this are cut at a sentence boundary before scoring.
    /// Default: 2000
    #[serde(default = "default_max_passage_chars")]
    pub max_passage_chars: usize,
}

fn default_reranker_enabled() -> bool {
    true
}

fn default_reranker_top_n() -> usize {
    7
}

fn default_max_passage_chars() -> usize {
    2000
}

impl Default for RerankerStageConfig {
    fn default() -> Self {
        Self {
            enabled: default_reranker_enabled(),
            top_n: default_reranker_top_n(),
            max_passage_chars: default_max_passage_chars(),
        }
    }
}

impl RerankerStageConfig {
    pub fn validate(&self) -> Result<Vec<String>, LaodongError> {
        let mut warnings = Vec::new();

        if self.top_n == 0 {
            return Err(LaodongError::invalid_configuration(
                "reranker.topN cannot be 0",
                "Set topN to at least 1 (recommended: 7)",
            ));
        }

        if self.max_passage_chars < 200 {
            warnings.push(format!(
                "reranker.maxPassageChars={} cuts most articles mid-clause",
                self.max_passage_chars
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Session memory configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Maximum retained tokens per session. Oldest turns are evicted first.
    /// Default: 12000
    #[serde(default = "default_session_token_budget")]
    pub token_budget: usize,

    /// How long a turn waits for a busy session before `SessionBusy`.
    /// Default: 0 (reject immediately)
    #[serde(default)]
    pub lock_wait_ms: u64,

    /// Idle sessions older than this are dropped by the sweeper.
    /// Default: 3600
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    /// History tokens included in the generation prompt.
    /// Default: 3000
    #[serde(default = "default_prompt_history_tokens")]
    pub prompt_history_tokens: usize,
}

fn default_session_token_budget() -> usize {
    12_000
}

fn default_idle_ttl_secs() -> u64 {
    3600
}

fn default_prompt_history_tokens() -> usize {
    3000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_budget: default_session_token_budget(),
            lock_wait_ms: 0,
            idle_ttl_secs: default_idle_ttl_secs(),
            prompt_history_tokens: default_prompt_history_tokens(),
        }
    }
}

impl SessionConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn validate(&self) -> Result<Vec<String>, LaodongError> {
        let mut warnings = Vec::new();

        if self.token_budget == 0 {
            return Err(LaodongError::invalid_configuration(
                "session.tokenBudget cannot be 0",
                "Set tokenBudget to at least 1000 (recommended: 12000)",
            ));
        }

        if self.prompt_history_tokens > self.token_budget {
            warnings.push(format!(
                "session.promptHistoryTokens ({}) > tokenBudget ({}); prompts will carry the whole session",
                self.prompt_history_tokens, self.token_budget
            ));
        }

        if self.lock_wait_ms > 60_000 {
            warnings.push(format!(
                "session.lockWaitMs={} holds callers for over a minute",
                self.lock_wait_ms
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// Timeouts
// ============================================================================

/// Per-capability timeouts, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutConfig {
    #[serde(default = "default_embed_ms")]
    pub embed_ms: u64,
    #[serde(default = "default_dense_ms")]
    pub dense_ms: u64,
    #[serde(default = "default_sparse_ms")]
    pub sparse_ms: u64,
    #[serde(default = "default_rerank_ms")]
    pub rerank_ms: u64,
    /// Wait for the first generated token.
    #[serde(default = "default_first_token_ms")]
    pub first_token_ms: u64,
    /// Wait between consecutive generated tokens.
    #[serde(default = "default_idle_token_ms")]
    pub idle_token_ms: u64,
    #[serde(default = "default_rewrite_ms")]
    pub rewrite_ms: u64,
    #[serde(default = "default_router_ms")]
    pub router_ms: u64,
}

fn default_embed_ms() -> u64 {
    5000
}

fn default_dense_ms() -> u64 {
    5000
}

fn default_sparse_ms() -> u64 {
    3000
}

fn default_rerank_ms() -> u64 {
    8000
}

fn default_first_token_ms() -> u64 {
    30_000
}

fn default_idle_token_ms() -> u64 {
    30_000
}

fn default_rewrite_ms() -> u64 {
    8000
}

fn default_router_ms() -> u64 {
    5000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embed_ms: default_embed_ms(),
            dense_ms: default_dense_ms(),
            sparse_ms: default_sparse_ms(),
            rerank_ms: default_rerank_ms(),
            first_token_ms: default_first_token_ms(),
            idle_token_ms: default_idle_token_ms(),
            rewrite_ms: default_rewrite_ms(),
            router_ms: default_router_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn embed(&self) -> Duration {
        Duration::from_millis(self.embed_ms)
    }

    pub fn dense(&self) -> Duration {
        Duration::from_millis(self.dense_ms)
    }

    pub fn sparse(&self) -> Duration {
        Duration::from_millis(self.sparse_ms)
    }

    pub fn rerank(&self) -> Duration {
        Duration::from_millis(self.rerank_ms)
    }

    pub fn first_token(&self) -> Duration {
        Duration::from_millis(self.first_token_ms)
    }

    pub fn idle_token(&self) -> Duration {
        Duration::from_millis(self.idle_token_ms)
    }

    pub fn rewrite(&self) -> Duration {
        Duration::from_millis(self.rewrite_ms)
    }

    pub fn router(&self) -> Duration {
        Duration::from_millis(self.router_ms)
    }

    pub fn validate(&self) -> Result<Vec<String>, LaodongError> {
        let all = [
            ("embedMs", self.embed_ms),
            ("denseMs", self.dense_ms),
            ("sparseMs", self.sparse_ms),
            ("rerankMs", self.rerank_ms),
            ("firstTokenMs", self.first_token_ms),
            ("idleTokenMs", self.idle_token_ms),
            ("rewriteMs", self.rewrite_ms),
            ("routerMs", self.router_ms),
        ];

        if let Some((name, _)) = all.iter().find(|(_, ms)| *ms == 0) {
            return Err(LaodongError::invalid_configuration(
                format!("timeouts.{} cannot be 0", name),
                "Every external call needs a positive timeout in milliseconds",
            ));
        }

        Ok(all
            .iter()
            .filter(|(_, ms)| *ms > 120_000)
            .map(|(name, ms)| format!("timeouts.{}={} is over two minutes", name, ms))
            .collect())
    }
}

// ============================================================================
// Corpus & backends
// ============================================================================

/// Location of the chunk corpus (JSONL).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Which dense search backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenseBackendKind {
    /// Brute-force search over the vectors stored in the corpus file.
    #[default]
    Memory,
    /// Remote Qdrant collection.
    Qdrant,
}

impl std::fmt::Display for DenseBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Qdrant => write!(f, "qdrant"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenseBackendConfig {
    #[serde(default)]
    pub kind: DenseBackendKind,

    /// Similarity metric for the in-memory index.
    #[serde(default)]
    pub metric: VectorMetric,

    /// Side-car JSONL of `{"chunkId", "vector"}` lines for the in-memory
    /// index. Vectors embedded in the corpus are used when unset.
    #[serde(default)]
    pub vectors_path: Option<PathBuf>,

    #[serde(default)]
    pub qdrant: QdrantConfig,
}

/// Capability backend endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendsConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub dense: DenseBackendConfig,

    #[serde(default)]
    pub reranker: RerankerConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}
