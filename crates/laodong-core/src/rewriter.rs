//! Query rewriter (condenser) for the legal path.
//!
//! Turns a follow-up such as "còn lao động nam thì sao?" into a standalone
//! query using a bounded window of recent turns. Every candidate passes
//! [`validate_rewrite`]; a rejected candidate falls back to the raw utterance
//! and is logged as `RewriteDegenerate`. Rewriting never fails a turn.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::bm25::{Tokenizer, TokenizerConfig};
use crate::capabilities::{collect_text, with_timeout, Generator};
use crate::config::{RewriterConfig, RewriterStrategy};
use crate::legal::{anchors, numbers, protected_keywords};
use crate::prompt::{condense_request, format_history};
use crate::tokens::estimate_tokens;
use crate::types::{ConversationTurn, Role};

/// Why a rewrite candidate was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteFallback {
    Empty,
    StopwordOnly,
    OverBudget { tokens: usize, budget: usize },
    DroppedKeyword(&'static str),
    DroppedNumber(String),
    Backend(String),
}

impl fmt::Display for RewriteFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty rewrite"),
            Self::StopwordOnly => write!(f, "stopword-only rewrite"),
            Self::OverBudget { tokens, budget } => write!(
                f,
                "{} tokens over budget of {} without a complete sentence",
                tokens, budget
            ),
            Self::DroppedKeyword(kw) => write!(f, "dropped protected keyword '{}'", kw),
            Self::DroppedNumber(n) => write!(f, "dropped number '{}'", n),
            Self::Backend(reason) => write!(f, "backend failed: {}", reason),
        }
    }
}

/// Result of one rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutcome {
    /// Query to retrieve with. The raw utterance when nothing changed.
    pub query: String,
    pub rewritten: bool,
    pub fallback: Option<RewriteFallback>,
}

impl RewriteOutcome {
    fn raw(utterance: &str) -> Self {
        Self {
            query: utterance.to_string(),
            rewritten: false,
            fallback: None,
        }
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

/// The last `exchanges` user/assistant pairs, oldest first.
pub fn history_window(history: &[ConversationTurn], exchanges: usize) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(exchanges * 2);
    &history[start..]
}

/// Append anchors from the most recent anchored user turn when the
/// utterance has none of its own.
pub fn heuristic_rewrite(utterance: &str, window: &[ConversationTurn]) -> String {
    let utterance = utterance.trim();
    if !anchors(utterance).is_empty() {
        return utterance.to_string();
    }

    let inherited = window
        .iter()
        .rev()
        .filter(|t| t.role == Role::User)
        .map(|t| anchors(&t.text))
        .find(|a| !a.is_empty());

    match inherited {
        Some(anchors) => format!("{} ({})", utterance, anchors.join(", ")),
        None => utterance.to_string(),
    }
}

/// Check a candidate against the raw utterance.
pub fn validate_rewrite(
    utterance: &str,
    candidate: &str,
    token_budget: usize,
    tokenizer: &Tokenizer,
) -> Result<(), RewriteFallback> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(RewriteFallback::Empty);
    }
    if tokenizer.tokenize(candidate).is_empty() {
        return Err(RewriteFallback::StopwordOnly);
    }

    let tokens = estimate_tokens(candidate);
    if tokens > token_budget && !ends_sentence(candidate) {
        return Err(RewriteFallback::OverBudget {
            tokens,
            budget: token_budget,
        });
    }

    let kept = protected_keywords(candidate);
    if let Some(dropped) = protected_keywords(utterance)
        .into_iter()
        .find(|kw| !kept.contains(kw))
    {
        return Err(RewriteFallback::DroppedKeyword(dropped));
    }

    let kept_numbers = numbers(candidate);
    if let Some(dropped) = numbers(utterance)
        .into_iter()
        .find(|n| !kept_numbers.contains(n))
    {
        return Err(RewriteFallback::DroppedNumber(dropped.to_string()));
    }

    Ok(())
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end()
        .ends_with(['.', '?', '!', '…'])
}

/// Strip the framing an LLM tends to add around the condensed question.
fn clean_completion(text: &str) -> String {
    let text = text.trim();
    let text = text
        .strip_prefix("Câu hỏi độc lập:")
        .unwrap_or(text)
        .trim();
    text.trim_matches(|c| c == '"' || c == '“' || c == '”')
        .trim()
        .to_string()
}

// ============================================================================
// QueryRewriter
// ============================================================================

pub struct QueryRewriter {
    strategy: RewriterStrategy,
    generator: Option<Arc<dyn Generator>>,
    history_exchanges: usize,
    max_turn_chars: usize,
    token_budget: usize,
    timeout: Duration,
    tokenizer: Tokenizer,
}

impl QueryRewriter {
    pub fn new(config: &RewriterConfig, generator: Option<Arc<dyn Generator>>, timeout: Duration) -> Self {
        Self {
            strategy: config.strategy,
            generator,
            history_exchanges: config.history_exchanges,
            max_turn_chars: config.max_turn_chars,
            token_budget: config.token_budget,
            timeout,
            tokenizer: Tokenizer::new(TokenizerConfig {
                bigrams: false,
                ..Default::default()
            }),
        }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Standalone query for `utterance` given the session history.
    pub async fn rewrite(&self, utterance: &str, history: &[ConversationTurn]) -> RewriteOutcome {
        self.rewrite_within(utterance, history, self.token_budget).await
    }

    /// Same as [`rewrite`](Self::rewrite) with an explicit token budget.
    pub async fn rewrite_within(
        &self,
        utterance: &str,
        history: &[ConversationTurn],
        token_budget: usize,
    ) -> RewriteOutcome {
        let window = history_window(history, self.history_exchanges);
        if window.is_empty() {
            return RewriteOutcome::raw(utterance);
        }

        let candidate = match self.candidate(utterance, window).await {
            Ok(candidate) => candidate,
            Err(reason) => return self.fall_back(utterance, reason),
        };

        if let Err(reason) = validate_rewrite(utterance, &candidate, token_budget, &self.tokenizer) {
            return self.fall_back(utterance, reason);
        }

        if candidate == utterance.trim() {
            return RewriteOutcome::raw(utterance);
        }

        debug!("Rewrote query: {:?} -> {:?}", utterance, candidate);
        RewriteOutcome {
            query: candidate,
            rewritten: true,
            fallback: None,
        }
    }

    async fn candidate(
        &self,
        utterance: &str,
        window: &[ConversationTurn],
    ) -> Result<String, RewriteFallback> {
        match (self.strategy, &self.generator) {
            (RewriterStrategy::Llm, Some(generator)) => {
                let history_text = format_history(window, self.max_turn_chars);
                let request = condense_request(utterance, &history_text);
                let completion = with_timeout("rewrite", self.timeout, async {
                    let stream = generator.generate(request).await?;
                    collect_text(stream).await
                })
                .await
                .map_err(|e| RewriteFallback::Backend(e.to_string()))?;
                Ok(clean_completion(&completion))
            }
            _ => Ok(heuristic_rewrite(utterance, window)),
        }
    }

    fn fall_back(&self, utterance: &str, reason: RewriteFallback) -> RewriteOutcome {
        warn!("RewriteDegenerate ({}), using raw utterance", reason);
        RewriteOutcome {
            query: utterance.to_string(),
            rewritten: false,
            fallback: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityError, CapabilityResult, GenerationRequest, TokenStream};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Condenser {
        answer: CapabilityResult<String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Condenser {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(text.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Generator for Condenser {
        fn name(&self) -> &str {
            "condenser"
        }

        async fn generate(&self, _: GenerationRequest) -> CapabilityResult<TokenStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let text = self.answer.clone()?;
            Ok(Box::pin(futures::stream::iter(vec![Ok(text)])))
        }
    }

    fn llm_rewriter(generator: Arc<Condenser>) -> QueryRewriter {
        let config = RewriterConfig {
            strategy: RewriterStrategy::Llm,
            ..Default::default()
        };
        QueryRewriter::new(&config, Some(generator), Duration::from_millis(200))
    }

    fn heuristic_rewriter() -> QueryRewriter {
        QueryRewriter::new(&RewriterConfig::default(), None, Duration::from_millis(200))
    }

    fn legal_history() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user("Điều 139 quy định gì về thai sản?"),
            ConversationTurn::assistant("Lao động nữ được nghỉ thai sản 06 tháng."),
        ]
    }

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(TokenizerConfig {
            bigrams: false,
            ..Default::default()
        })
    }

    // ========================================================================
    // Pure helpers
    // ========================================================================

    #[test]
    fn test_history_window_keeps_last_exchanges() {
        let turns: Vec<ConversationTurn> = (0..10)
            .map(|i| ConversationTurn::user(format!("t{}", i)))
            .collect();
        let window = history_window(&turns, 3);
        assert_eq!(window.len(), 6);
        assert_eq!(window[0].text, "t4");
        assert_eq!(history_window(&turns[..2], 3).len(), 2);
    }

    #[test]
    fn test_heuristic_carries_anchors() {
        let rewritten = heuristic_rewrite("còn lao động nam thì sao?", &legal_history());
        assert_eq!(rewritten, "còn lao động nam thì sao? (Điều 139, thai sản)");
    }

    #[test]
    fn test_heuristic_keeps_anchored_utterance() {
        let utterance = "Điều 46 về trợ cấp thôi việc";
        assert_eq!(heuristic_rewrite(utterance, &legal_history()), utterance);
    }

    #[test]
    fn test_validate_rejects_dropped_keyword() {
        let result = validate_rewrite(
            "nghỉ thai sản bao lâu?",
            "nghỉ sinh con bao lâu?",
            128,
            &tokenizer(),
        );
        assert_eq!(result, Err(RewriteFallback::DroppedKeyword("thai sản")));
    }

    #[test]
    fn test_validate_rejects_dropped_number() {
        let result = validate_rewrite(
            "làm 5 năm được trợ cấp bao nhiêu?",
            "trợ cấp thôi việc tính thế nào?",
            128,
            &tokenizer(),
        );
        assert_eq!(result, Err(RewriteFallback::DroppedNumber("5".to_string())));
    }

    #[test]
    fn test_validate_matches_whole_numbers() {
        let t = tokenizer();
        assert_eq!(
            validate_rewrite(
                "Điều 139 quy định gì về thai sản?",
                "Điều 1390 quy định gì về thai sản?",
                128,
                &t,
            ),
            Err(RewriteFallback::DroppedNumber("139".to_string()))
        );
        assert_eq!(
            validate_rewrite(
                "Nghị định 145/2020 áp dụng khi nào?",
                "Nghị định 145/20201 áp dụng khi nào?",
                128,
                &t,
            ),
            Err(RewriteFallback::DroppedNumber("145/2020".to_string()))
        );
        assert!(validate_rewrite(
            "Điều 139 quy định gì về thai sản?",
            "Nghỉ thai sản theo Điều 139 Bộ luật Lao động",
            128,
            &t,
        )
        .is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_stopwords() {
        let t = tokenizer();
        assert_eq!(validate_rewrite("x", "  ", 128, &t), Err(RewriteFallback::Empty));
        assert_eq!(
            validate_rewrite("x", "thì sao?", 128, &t),
            Err(RewriteFallback::StopwordOnly)
        );
    }

    #[test]
    fn test_validate_over_budget() {
        let t = tokenizer();
        let long = "lao động ".repeat(40);
        assert!(matches!(
            validate_rewrite("x", &long, 16, &t),
            Err(RewriteFallback::OverBudget { .. })
        ));
        // A complete sentence is accepted even when long.
        let sentence = format!("{}?", long.trim());
        assert_eq!(validate_rewrite("x", &sentence, 16, &t), Ok(()));
    }

    #[test]
    fn test_clean_completion() {
        assert_eq!(
            clean_completion("Câu hỏi độc lập: \"Nghỉ thai sản bao lâu?\"\n"),
            "Nghỉ thai sản bao lâu?"
        );
    }

    // ========================================================================
    // QueryRewriter
    // ========================================================================

    #[tokio::test]
    async fn test_no_history_skips_backend() {
        let generator = Condenser::answering("không dùng");
        let rewriter = llm_rewriter(generator.clone());
        let outcome = rewriter.rewrite("Điều 139 là gì?", &[]).await;
        assert_eq!(outcome.query, "Điều 139 là gì?");
        assert!(!outcome.rewritten);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_llm_rewrite_accepted() {
        let generator = Condenser::answering("Lao động nam được nghỉ thai sản bao lâu theo Điều 139?");
        let outcome = llm_rewriter(generator)
            .rewrite("còn lao động nam thì sao?", &legal_history())
            .await;
        assert!(outcome.rewritten);
        assert!(outcome.query.contains("thai sản"));
    }

    #[tokio::test]
    async fn test_llm_rewrite_dropping_keyword_falls_back() {
        let generator = Condenser::answering("Lao động nam được nghỉ bao lâu?");
        let utterance = "còn nghỉ thai sản của lao động nam thì sao?";
        let outcome = llm_rewriter(generator).rewrite(utterance, &legal_history()).await;
        assert_eq!(outcome.query, utterance);
        assert_eq!(
            outcome.fallback,
            Some(RewriteFallback::DroppedKeyword("thai sản"))
        );
    }

    #[tokio::test]
    async fn test_llm_timeout_falls_back() {
        let generator = Arc::new(Condenser {
            answer: Ok("chậm".to_string()),
            delay: Duration::from_secs(5),
            calls: AtomicUsize::new(0),
        });
        let outcome = llm_rewriter(generator).rewrite("thế còn nam?", &legal_history()).await;
        assert_eq!(outcome.query, "thế còn nam?");
        assert!(matches!(outcome.fallback, Some(RewriteFallback::Backend(_))));
    }

    #[tokio::test]
    async fn test_llm_backend_error_falls_back() {
        let generator = Arc::new(Condenser {
            answer: Err(CapabilityError::backend("generate", "500")),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        });
        let outcome = llm_rewriter(generator).rewrite("thế còn nam?", &legal_history()).await;
        assert!(!outcome.rewritten);
        assert!(outcome.fallback.is_some());
    }

    #[tokio::test]
    async fn test_heuristic_rewriter() {
        let outcome = heuristic_rewriter()
            .rewrite("còn lao động nam thì sao?", &legal_history())
            .await;
        assert!(outcome.rewritten);
        assert!(outcome.query.ends_with("(Điều 139, thai sản)"));
    }
}
