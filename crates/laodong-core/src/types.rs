//! Common types for laodong-core.
//!
//! Provisions and chunks are read-only inputs loaded from the corpus.
//! Candidates, fused results and reranked results live for one request.
//! Conversation turns are owned by the session store.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tokens::estimate_tokens;

// ============================================================================
// ChunkId
// ============================================================================

/// Identifier of an indexed retrieval unit. Candidate identity across lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ChunkId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ChunkId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Provision & Chunk
// ============================================================================

/// A legal article. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provision {
    /// Provision identifier.
    pub id: String,
    /// Law or decree identifier, e.g. `45/2019/QH14`.
    pub source_code: String,
    /// Article number, e.g. `139`.
    pub article: String,
    /// Full article text.
    #[serde(default)]
    pub text: String,
    /// Chapter, when the instrument is divided into chapters.
    #[serde(default)]
    pub chapter: Option<String>,
    /// Section within the chapter.
    #[serde(default)]
    pub section: Option<String>,
    /// Instrument type (Bộ luật, Luật, Nghị định, ...).
    #[serde(default)]
    pub doc_type: Option<String>,
    /// Full instrument name.
    #[serde(default)]
    pub doc_name: Option<String>,
    /// Short instrument name, e.g. `BLLĐ 2019`.
    #[serde(default)]
    pub short_name: Option<String>,
    /// Article heading.
    #[serde(default)]
    pub article_title: Option<String>,
    /// Effective date as written in the instrument.
    #[serde(default)]
    pub effective_date: Option<String>,
    /// Validity status (còn hiệu lực, hết hiệu lực, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Cross-referenced provisions.
    #[serde(default)]
    pub references: Vec<String>,
}

impl Provision {
    /// Human-readable label used in prompts, e.g. `Điều 139 (BLLĐ 2019)`.
    pub fn label(&self) -> String {
        let instrument = self
            .short_name
            .as_deref()
            .or(self.doc_name.as_deref())
            .unwrap_or(&self.source_code);
        match &self.article_title {
            Some(title) => format!("Điều {}. {} ({})", self.article, title, instrument),
            None => format!("Điều {} ({})", self.article, instrument),
        }
    }
}

/// An indexed retrieval unit. Each chunk belongs to exactly one provision.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub provision: Arc<Provision>,
    pub text: String,
}

// ============================================================================
// Retrieval results
// ============================================================================

/// Which retrieval list a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListTag {
    Dense,
    Sparse,
}

impl fmt::Display for ListTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dense => write!(f, "dense"),
            Self::Sparse => write!(f, "sparse"),
        }
    }
}

/// One entry of a dense or sparse list. Rank 1 is the most relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalCandidate {
    pub chunk_id: ChunkId,
    /// Raw score on the backend's native scale.
    pub score: f32,
    pub list: ListTag,
    pub rank: usize,
}

/// A candidate after reciprocal-rank fusion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedResult {
    pub chunk_id: ChunkId,
    /// Sum of `1 / (rank + k)` over the lists containing the chunk.
    pub score: f64,
    /// 1-based position after fusion.
    pub rank: usize,
    pub dense_rank: Option<usize>,
    pub sparse_rank: Option<usize>,
}

/// Final ordering delivered to prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankedResult {
    pub chunk_id: ChunkId,
    /// Reranker relevance, or the fused score when `reranked` is false.
    pub score: f32,
    /// 1-based final position.
    pub rank: usize,
    pub fused_rank: usize,
    /// False when the reranker was skipped or failed.
    pub reranked: bool,
}

// ============================================================================
// Conversation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Vietnamese label used when history is rendered into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "Người dùng",
            Self::Assistant => "Trợ lý",
        }
    }
}

/// One utterance in a session. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub tokens: usize,
    /// Provisions that grounded an assistant answer. Empty for chat and
    /// ungrounded answers. Not counted in `tokens`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = estimate_tokens(&text);
        Self {
            role,
            text,
            timestamp: Utc::now(),
            tokens,
            citations: Vec::new(),
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

// ============================================================================
// Routing
// ============================================================================

/// Intent category assigned by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentCategory {
    Legal,
    Chat,
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legal => write!(f, "LEGAL"),
            Self::Chat => write!(f, "CHAT"),
        }
    }
}

impl std::str::FromStr for IntentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LEGAL" | "LAW" => Ok(Self::Legal),
            "CHAT" => Ok(Self::Chat),
            other => Err(format!("Unknown intent category: '{}'", other)),
        }
    }
}

/// Router output for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterDecision {
    pub category: IntentCategory,
    /// Winner's confidence in `[0, 1]`.
    pub confidence: f32,
    /// Short explanation, e.g. "below threshold" or "classifier unavailable".
    pub reason: String,
}

// ============================================================================
// Citation
// ============================================================================

/// A provision cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub provision_id: String,
    pub source_code: String,
    pub article: String,
    pub article_title: Option<String>,
    pub chapter: Option<String>,
    pub chunk_id: ChunkId,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provision() -> Provision {
        serde_json::from_str(
            r#"{"id":"blld-2019-139","sourceCode":"45/2019/QH14","article":"139",
                "articleTitle":"Nghỉ thai sản","shortName":"BLLĐ 2019"}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_provision_optional_fields_default() {
        let p = provision();
        assert_eq!(p.chapter, None);
        assert!(p.references.is_empty());
        assert!(p.text.is_empty());
    }

    #[test]
    fn test_provision_label() {
        assert_eq!(provision().label(), "Điều 139. Nghỉ thai sản (BLLĐ 2019)");

        let mut bare = provision();
        bare.article_title = None;
        bare.short_name = None;
        assert_eq!(bare.label(), "Điều 139 (45/2019/QH14)");
    }

    #[test]
    fn test_turn_token_estimate() {
        let turn = ConversationTurn::user("abcdefghi");
        assert_eq!(turn.tokens, 3);
        assert_eq!(turn.role, Role::User);
    }

    #[test]
    fn test_turn_citations_serialize_only_when_present() {
        let plain = serde_json::to_value(ConversationTurn::assistant("Chào bạn")).unwrap();
        assert!(plain.get("citations").is_none());

        let cited = ConversationTurn::assistant("Theo Điều 139...").with_citations(vec![Citation {
            provision_id: "blld-2019-139".to_string(),
            source_code: "45/2019/QH14".to_string(),
            article: "139".to_string(),
            article_title: None,
            chapter: None,
            chunk_id: ChunkId::new("139-1"),
            score: 0.9,
        }]);
        assert_eq!(cited.tokens, ConversationTurn::assistant("Theo Điều 139...").tokens);
        let json = serde_json::to_value(&cited).unwrap();
        assert_eq!(json["citations"][0]["article"], "139");

        let back: ConversationTurn = serde_json::from_value(plain).unwrap();
        assert!(back.citations.is_empty());
    }

    #[test]
    fn test_intent_category_parse_and_serde() {
        assert_eq!("law".parse::<IntentCategory>(), Ok(IntentCategory::Legal));
        assert_eq!(" CHAT ".parse::<IntentCategory>(), Ok(IntentCategory::Chat));
        assert!("other".parse::<IntentCategory>().is_err());
        assert_eq!(
            serde_json::to_string(&IntentCategory::Legal).unwrap(),
            "\"LEGAL\""
        );
    }

    #[test]
    fn test_chunk_id_borrow_lookup() {
        let mut map = std::collections::HashMap::new();
        map.insert(ChunkId::from("c1"), 1);
        assert_eq!(map.get("c1"), Some(&1));
    }
}
