//! Query router: LEGAL or CHAT, before any retrieval work.
//!
//! A classifier scores both categories; the winner's share of the two
//! scores is the confidence. Below `router.threshold` the configured default
//! category applies, and so it does when the classifier fails. Routing never
//! fails a turn.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use laodong_db::vector::cosine_similarity;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::bm25::{Tokenizer, TokenizerConfig};
use crate::capabilities::{
    collect_text, with_timeout, CapabilityError, CapabilityResult, Embedder, Generator,
};
use crate::config::{RouterConfig, RouterStrategy};
use crate::legal::legal_signal;
use crate::prompt::{format_history, router_request};
use crate::types::{ConversationTurn, IntentCategory, Role, RouterDecision};

/// Raw per-category scores, both non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryScores {
    pub legal: f32,
    pub chat: f32,
}

/// Scores an utterance against both categories.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    fn name(&self) -> &str;

    async fn score(
        &self,
        utterance: &str,
        history: &[ConversationTurn],
    ) -> CapabilityResult<CategoryScores>;
}

// ============================================================================
// QueryRouter
// ============================================================================

/// Applies threshold and default-category policy on top of a classifier.
pub struct QueryRouter {
    classifier: Box<dyn IntentClassifier>,
    threshold: f32,
    default_category: IntentCategory,
    timeout: Duration,
}

impl QueryRouter {
    pub fn new(
        classifier: Box<dyn IntentClassifier>,
        threshold: f32,
        default_category: IntentCategory,
        timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            threshold,
            default_category,
            timeout,
        }
    }

    /// Build the classifier selected by `config.strategy`.
    pub fn from_config(
        config: &RouterConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        timeout: Duration,
    ) -> Self {
        let classifier: Box<dyn IntentClassifier> = match config.strategy {
            RouterStrategy::Lexical => Box::new(LexicalClassifier::new(
                &config.legal_exemplars,
                &config.chat_exemplars,
            )),
            RouterStrategy::Semantic => Box::new(SemanticClassifier::new(
                embedder,
                config.legal_exemplars.clone(),
                config.chat_exemplars.clone(),
            )),
            RouterStrategy::Llm => Box::new(LlmClassifier::new(generator)),
        };
        Self::new(classifier, config.threshold, config.default_category, timeout)
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify an utterance. Never fails.
    pub async fn classify(&self, utterance: &str, history: &[ConversationTurn]) -> RouterDecision {
        let scores = with_timeout(
            "router",
            self.timeout,
            self.classifier.score(utterance, history),
        )
        .await;

        let decision = match scores {
            Ok(scores) => self.decide(scores),
            Err(e) => {
                error!("Router classifier {} unavailable: {}", self.classifier.name(), e);
                RouterDecision {
                    category: self.default_category,
                    confidence: 0.0,
                    reason: "classifier unavailable".to_string(),
                }
            }
        };

        debug!(
            "Router: {} (confidence {:.2}, {})",
            decision.category, decision.confidence, decision.reason
        );
        decision
    }

    /// Threshold policy. Pure.
    pub fn decide(&self, scores: CategoryScores) -> RouterDecision {
        let legal = scores.legal.max(0.0);
        let chat = scores.chat.max(0.0);
        let total = legal + chat;

        if total.is_nan() || total <= 0.0 {
            return RouterDecision {
                category: self.default_category,
                confidence: 0.0,
                reason: "no signal".to_string(),
            };
        }

        let (winner, best) = if legal >= chat {
            (IntentCategory::Legal, legal)
        } else {
            (IntentCategory::Chat, chat)
        };
        let confidence = best / total;

        if confidence < self.threshold {
            RouterDecision {
                category: self.default_category,
                confidence,
                reason: "below threshold".to_string(),
            }
        } else {
            RouterDecision {
                category: winner,
                confidence,
                reason: self.classifier.name().to_string(),
            }
        }
    }
}

// ============================================================================
// Lexical
// ============================================================================

/// Token-overlap similarity to exemplars, boosted by legal signals.
pub struct LexicalClassifier {
    tokenizer: Tokenizer,
    legal: Vec<HashSet<String>>,
    chat: Vec<HashSet<String>>,
}

impl LexicalClassifier {
    pub fn new(legal_exemplars: &[String], chat_exemplars: &[String]) -> Self {
        let tokenizer = Tokenizer::new(TokenizerConfig {
            bigrams: false,
            ..Default::default()
        });
        let sets = |exemplars: &[String]| -> Vec<HashSet<String>> {
            exemplars
                .iter()
                .map(|e| tokenizer.tokenize(e).into_iter().collect::<HashSet<String>>())
                .filter(|s| !s.is_empty())
                .collect()
        };
        let legal = sets(legal_exemplars);
        let chat = sets(chat_exemplars);
        Self {
            tokenizer,
            legal,
            chat,
        }
    }

    fn best_overlap(tokens: &HashSet<String>, exemplars: &[HashSet<String>]) -> f32 {
        exemplars
            .iter()
            .map(|e| overlap_similarity(tokens, e))
            .fold(0.0, f32::max)
    }

    /// Scores for an utterance with its own signals only.
    fn own_scores(&self, utterance: &str) -> (CategoryScores, f32) {
        let tokens: HashSet<String> = self.tokenizer.tokenize(utterance).into_iter().collect();
        let signal = legal_signal(utterance);
        let legal = (Self::best_overlap(&tokens, &self.legal) + signal).min(1.0);
        let chat = Self::best_overlap(&tokens, &self.chat);
        (CategoryScores { legal, chat }, signal)
    }
}

#[async_trait]
impl IntentClassifier for LexicalClassifier {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(
        &self,
        utterance: &str,
        history: &[ConversationTurn],
    ) -> CapabilityResult<CategoryScores> {
        let (mut scores, signal) = self.own_scores(utterance);

        // A bare follow-up ("còn lao động nam thì sao?") inherits part of the
        // legal signal of the previous question.
        if signal == 0.0 && scores.chat < 0.5 {
            if let Some(previous) = history.iter().rev().find(|t| t.role == Role::User) {
                let inherited = legal_signal(&previous.text);
                scores.legal = (scores.legal + 0.5 * inherited).min(1.0);
            }
        }

        Ok(scores)
    }
}

/// `|a ∩ b| / sqrt(|a| |b|)`, 0 for an empty side.
pub fn overlap_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count() as f32;
    common / ((a.len() * b.len()) as f32).sqrt()
}

// ============================================================================
// Semantic
// ============================================================================

/// Cosine similarity between embeddings, best exemplar per category.
pub struct SemanticClassifier {
    embedder: Arc<dyn Embedder>,
    legal_exemplars: Vec<String>,
    chat_exemplars: Vec<String>,
    /// Exemplar vectors, computed on first use.
    vectors: OnceCell<(Vec<Vec<f32>>, Vec<Vec<f32>>)>,
}

impl SemanticClassifier {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        legal_exemplars: Vec<String>,
        chat_exemplars: Vec<String>,
    ) -> Self {
        Self {
            embedder,
            legal_exemplars,
            chat_exemplars,
            vectors: OnceCell::new(),
        }
    }

    async fn embed_all(&self, texts: &[String]) -> CapabilityResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embedder.embed(text).await?);
        }
        Ok(out)
    }

    async fn exemplar_vectors(&self) -> CapabilityResult<&(Vec<Vec<f32>>, Vec<Vec<f32>>)> {
        self.vectors
            .get_or_try_init(|| async {
                let legal = self.embed_all(&self.legal_exemplars).await?;
                let chat = self.embed_all(&self.chat_exemplars).await?;
                debug!(
                    "Embedded router exemplars: {} legal, {} chat",
                    legal.len(),
                    chat.len()
                );
                Ok((legal, chat))
            })
            .await
    }
}

fn best_cosine(query: &[f32], exemplars: &[Vec<f32>]) -> f32 {
    exemplars
        .iter()
        .map(|e| cosine_similarity(query, e))
        .fold(0.0, f32::max)
}

#[async_trait]
impl IntentClassifier for SemanticClassifier {
    fn name(&self) -> &str {
        "semantic"
    }

    async fn score(
        &self,
        utterance: &str,
        history: &[ConversationTurn],
    ) -> CapabilityResult<CategoryScores> {
        let (legal, chat) = self.exemplar_vectors().await?;
        let query = self.embedder.embed(utterance).await?;
        let own = CategoryScores {
            legal: best_cosine(&query, legal),
            chat: best_cosine(&query, chat),
        };

        if legal_signal(utterance) > 0.0 || !is_follow_up(utterance) {
            return Ok(own);
        }
        let Some(previous) = history.iter().rev().find(|t| t.role == Role::User) else {
            return Ok(own);
        };

        // A follow-up is about whatever the previous question was about.
        let previous = self.embedder.embed(&previous.text).await?;
        let inherited = CategoryScores {
            legal: best_cosine(&previous, legal),
            chat: best_cosine(&previous, chat),
        };
        Ok(CategoryScores {
            legal: 0.25 * own.legal + 0.75 * inherited.legal,
            chat: 0.25 * own.chat + 0.75 * inherited.chat,
        })
    }
}

const FOLLOW_UP_OPENERS: &[&str] = &[
    "còn",
    "thế còn",
    "vậy còn",
    "vậy thì",
    "thế thì",
    "nếu",
    "trường hợp",
    "ngoài ra",
];

const FOLLOW_UP_TAILS: &[&str] = &["thì sao", "thì thế nào"];

/// Whether an utterance leans on the previous question for its topic,
/// e.g. `còn lao động nam thì sao?`.
fn is_follow_up(utterance: &str) -> bool {
    let normalized: String = utterance
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    if words.is_empty() {
        return false;
    }
    let padded = format!(" {} ", words);

    FOLLOW_UP_OPENERS
        .iter()
        .any(|o| padded.starts_with(&format!(" {} ", o)))
        || FOLLOW_UP_TAILS
            .iter()
            .any(|t| padded.contains(&format!(" {} ", t)))
}

// ============================================================================
// LLM
// ============================================================================

/// Asks the generation backend for `INTENT:` / `CONFIDENCE:` lines.
pub struct LlmClassifier {
    generator: Arc<dyn Generator>,
}

impl LlmClassifier {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn score(
        &self,
        utterance: &str,
        history: &[ConversationTurn],
    ) -> CapabilityResult<CategoryScores> {
        let window_start = history.len().saturating_sub(6);
        let history_text = format_history(&history[window_start..], 200);
        let stream = self
            .generator
            .generate(router_request(utterance, &history_text))
            .await?;
        let answer = collect_text(stream).await?;

        let (category, confidence) = parse_router_answer(&answer)?;
        Ok(match category {
            IntentCategory::Legal => CategoryScores {
                legal: confidence,
                chat: 1.0 - confidence,
            },
            IntentCategory::Chat => CategoryScores {
                legal: 1.0 - confidence,
                chat: confidence,
            },
        })
    }
}

/// Parse `INTENT:` and `CONFIDENCE:` lines.
///
/// A missing intent line means LEGAL, a missing confidence line means 0.8.
/// An answer with neither line, or with a value that does not parse, is an
/// error.
pub fn parse_router_answer(answer: &str) -> CapabilityResult<(IntentCategory, f32)> {
    let field = |name: &str| {
        answer.lines().find_map(|line| {
            let line = line.trim().trim_start_matches(['*', '-', ' ']);
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().trim_matches('*').trim().to_string())
        })
    };

    let intent = field("INTENT");
    let confidence = field("CONFIDENCE");
    if intent.is_none() && confidence.is_none() {
        return Err(CapabilityError::protocol(
            "router",
            format!("no INTENT or CONFIDENCE line in {:?}", clip(answer)),
        ));
    }

    let category = match intent {
        Some(value) => value
            .parse::<IntentCategory>()
            .map_err(|e| CapabilityError::protocol("router", e))?,
        None => IntentCategory::Legal,
    };
    let confidence = match confidence {
        Some(value) => value
            .parse::<f32>()
            .map_err(|e| CapabilityError::protocol("router", format!("bad confidence: {}", e)))?,
        None => 0.8,
    };
    if !confidence.is_finite() {
        return Err(CapabilityError::protocol("router", "confidence is not finite"));
    }

    Ok((category, confidence.clamp(0.0, 1.0)))
}

fn clip(text: &str) -> String {
    crate::tokens::clip_chars(text, 80)
}
