//! End-to-end turn tests over capability doubles.
//!
//! Every backend is an in-process double from `common`, so these exercise the
//! whole pipeline (routing, retrieval, fusion, rerank, streaming, commit)
//! without network access.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use laodong_core::prompt::{EMPTY_ANSWER_FALLBACK, NO_GROUNDING_DISCLAIMER};
use laodong_core::{
    ConversationEngine, IntentCategory, LaodongError, Role, TurnError, TurnEvent,
};

use common::{
    capabilities, test_config, CountingGenerator, FailingEmbedder, FailingGenerator,
    FailingSparseSearch, KeywordReranker, ScriptedGenerator, ScriptedSparseSearch,
    ScriptedVectorSearch,
};

const MATERNITY_QUESTION: &str = "Điều 139 quy định gì về thai sản?";

// ============================================================================
// Routing and grounding
// ============================================================================

#[tokio::test]
async fn test_greeting_is_answered_as_chat() {
    let generator = Arc::new(ScriptedGenerator::new(&["Xin chào! ", "Tôi có thể giúp gì?"]));
    let engine = ConversationEngine::new(test_config(), capabilities(generator.clone())).unwrap();

    let outcome = engine.submit_turn("s1", "Xin chào").collect_outcome().await;

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.category, Some(IntentCategory::Chat));
    assert!(!outcome.grounded);
    assert!(outcome.citations.is_empty());
    assert_eq!(outcome.answer, "Xin chào! Tôi có thể giúp gì?");

    // No provisions reach the chat prompt.
    let request = generator.last_request();
    assert!(!request.system.contains("[1]"));
    assert_eq!(request.prompt, "Xin chào");

    let history = engine.session_history("s1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].text, "Xin chào! Tôi có thể giúp gì?");
    assert!(history[1].citations.is_empty());
}

#[tokio::test]
async fn test_legal_turn_streams_then_cites() {
    let generator = Arc::new(ScriptedGenerator::new(&["Theo Điều 139, ", "lao động nữ được nghỉ 06 tháng."]));
    let engine = ConversationEngine::new(test_config(), capabilities(generator.clone())).unwrap();

    let mut stream = engine.submit_turn("s1", MATERNITY_QUESTION);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }

    // Tokens first, citations last.
    assert!(matches!(events[0], TurnEvent::Token { .. }));
    let Some(TurnEvent::Citations {
        category,
        grounded,
        citations,
    }) = events.last()
    else {
        panic!("last event should be citations: {:?}", events.last());
    };
    assert_eq!(*category, IntentCategory::Legal);
    assert!(*grounded);
    assert_eq!(citations[0].article, "139");
    assert_eq!(citations.len(), 3);

    // Chunk 139 is first in both lists, so it leads the prompt.
    let request = generator.last_request();
    assert!(request.system.contains("[1] Điều 139. Nghỉ thai sản"));
    assert_eq!(request.prompt, MATERNITY_QUESTION);

    // The committed answer remembers what grounded it.
    let history = engine.session_history("s1").await.unwrap();
    assert!(history[0].citations.is_empty());
    assert_eq!(&history[1].citations, citations);
}

#[tokio::test]
async fn test_sparse_timeout_still_grounds_on_dense_list() {
    let generator = Arc::new(ScriptedGenerator::new(&["Được nghỉ 06 tháng."]));
    let mut caps = capabilities(generator.clone());
    caps.sparse = Arc::new(ScriptedSparseSearch::slow(
        &["75-1"],
        Duration::from_millis(800),
    ));
    let engine = ConversationEngine::new(test_config(), caps).unwrap();

    let outcome = engine
        .submit_turn("s1", MATERNITY_QUESTION)
        .collect_outcome()
        .await;

    assert_eq!(outcome.error, None);
    assert!(outcome.grounded);
    assert!(outcome.citations.iter().any(|c| c.article == "139"));
    assert!(!outcome.answer.starts_with(NO_GROUNDING_DISCLAIMER));
}

#[tokio::test]
async fn test_both_legs_failing_degrades_with_disclaimer() {
    let generator = Arc::new(ScriptedGenerator::new(&["Theo quy định chung..."]));
    let mut caps = capabilities(generator.clone());
    caps.embedder = Arc::new(FailingEmbedder);
    caps.sparse = Arc::new(FailingSparseSearch);
    let engine = ConversationEngine::new(test_config(), caps).unwrap();

    let mut stream = engine.submit_turn("s1", MATERNITY_QUESTION);
    let first = stream.next().await;
    assert_eq!(
        first,
        Some(TurnEvent::Token {
            text: NO_GROUNDING_DISCLAIMER.to_string()
        })
    );

    let outcome = stream.collect_outcome().await;
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.category, Some(IntentCategory::Legal));
    assert!(!outcome.grounded);
    assert!(outcome.citations.is_empty());

    // The disclaimer is shown, not remembered.
    let history = engine.session_history("s1").await.unwrap();
    assert_eq!(history[1].text, "Theo quy định chung...");
    assert!(history[1].citations.is_empty());
}

#[tokio::test]
async fn test_reranker_reorders_passages_and_citations() {
    let generator = Arc::new(ScriptedGenerator::new(&["..."]));
    let mut caps = capabilities(generator.clone());
    // Fused order is 46, 139, 75.
    caps.vector = Arc::new(ScriptedVectorSearch::new(&["46-1", "139-1", "75-1"]));
    caps.sparse = Arc::new(ScriptedSparseSearch::new(&[]));
    caps.reranker = Some(Arc::new(KeywordReranker {
        scores: vec![("Điều 46.", 0.2), ("Điều 139.", 0.9), ("Điều 75.", 0.5)],
    }));
    let engine = ConversationEngine::new(test_config(), caps).unwrap();

    let outcome = engine
        .submit_turn("s1", MATERNITY_QUESTION)
        .collect_outcome()
        .await;

    let articles: Vec<&str> = outcome.citations.iter().map(|c| c.article.as_str()).collect();
    assert_eq!(articles, vec!["139", "75", "46"]);

    let system = generator.last_request().system;
    let pos = |label: &str| system.find(label).unwrap();
    assert!(pos("[1] Điều 139.") < pos("[2] Điều 75."));
    assert!(pos("[2] Điều 75.") < pos("[3] Điều 46."));
}

// ============================================================================
// Failures and cancellation
// ============================================================================

#[tokio::test]
async fn test_generation_failure_leaves_session_unchanged() {
    let engine = ConversationEngine::new(test_config(), capabilities(Arc::new(FailingGenerator))).unwrap();

    let outcome = engine
        .submit_turn("s1", MATERNITY_QUESTION)
        .collect_outcome()
        .await;

    assert!(matches!(outcome.error, Some(TurnError::Generation { .. })));
    assert_eq!(outcome.category, None);
    assert_eq!(engine.session_history("s1").await, Some(Vec::new()));
}

#[tokio::test]
async fn test_first_token_timeout() {
    let mut config = test_config();
    config.timeouts.first_token_ms = 50;
    let generator = Arc::new(ScriptedGenerator::slow(&["muộn"], Duration::from_millis(500)));
    let engine = ConversationEngine::new(config, capabilities(generator)).unwrap();

    let outcome = engine.submit_turn("s1", "Xin chào").collect_outcome().await;

    assert!(matches!(
        outcome.error,
        Some(TurnError::GenerationTimeout { .. })
    ));
    assert_eq!(engine.session_history("s1").await, Some(Vec::new()));
}

#[tokio::test]
async fn test_dropping_stream_cancels_turn() {
    let generator = Arc::new(CountingGenerator::default());
    let engine = ConversationEngine::new(test_config(), capabilities(generator.clone())).unwrap();

    let mut stream = engine.submit_turn("s1", MATERNITY_QUESTION);
    for _ in 0..3 {
        assert!(matches!(stream.next().await, Some(TurnEvent::Token { .. })));
    }
    drop(stream);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = generator.pulls();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(generator.pulls(), settled, "tokens pulled after cancellation");

    // Nothing was committed and the session is free again.
    assert_eq!(engine.session_history("s1").await, Some(Vec::new()));
    assert!(engine.reset_session("s1").is_ok());
}

#[tokio::test]
async fn test_empty_answer_uses_fallback() {
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let engine = ConversationEngine::new(test_config(), capabilities(generator)).unwrap();

    let outcome = engine.submit_turn("s1", "Xin chào").collect_outcome().await;

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.answer, EMPTY_ANSWER_FALLBACK);
    let history = engine.session_history("s1").await.unwrap();
    assert_eq!(history[1].text, EMPTY_ANSWER_FALLBACK);
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_busy_session_rejects_turn_and_reset() {
    let generator = Arc::new(ScriptedGenerator::slow(
        &["Lao ", "động ", "nữ"],
        Duration::from_millis(100),
    ));
    let engine = ConversationEngine::new(test_config(), capabilities(generator)).unwrap();

    let mut first = engine.submit_turn("s1", MATERNITY_QUESTION);
    // Once a token arrives the first turn holds the session.
    assert!(matches!(first.next().await, Some(TurnEvent::Token { .. })));

    let second = engine.submit_turn("s1", "Xin chào").collect_outcome().await;
    assert_eq!(
        second.error,
        Some(TurnError::SessionBusy {
            session_id: "s1".to_string()
        })
    );
    assert!(matches!(
        engine.reset_session("s1"),
        Err(LaodongError::SessionBusy { .. })
    ));

    // Other sessions proceed.
    let other = engine.submit_turn("s2", "Xin chào").collect_outcome().await;
    assert_eq!(other.error, None);

    let rest = first.collect_outcome().await;
    assert_eq!(rest.error, None);
    assert_eq!(engine.session_history("s1").await.unwrap().len(), 2);

    // The lock is released before the final event.
    let next = engine.submit_turn("s1", "Cảm ơn").collect_outcome().await;
    assert_eq!(next.error, None);
}

#[tokio::test]
async fn test_session_stays_within_token_budget() {
    let mut config = test_config();
    config.session.token_budget = 60;
    config.session.prompt_history_tokens = 40;
    let answer = "Người lao động được hưởng chế độ theo quy định.";
    let generator = Arc::new(ScriptedGenerator::new(&[answer]));
    let engine = ConversationEngine::new(config, capabilities(generator.clone())).unwrap();

    for i in 0..6 {
        let outcome = engine
            .submit_turn("s1", format!("Câu hỏi số {} về trợ cấp thôi việc?", i))
            .collect_outcome()
            .await;
        assert_eq!(outcome.error, None);

        let history = engine.session_history("s1").await.unwrap();
        let tokens: usize = history.iter().map(|t| t.tokens).sum();
        assert!(tokens <= 60, "session holds {} tokens", tokens);
    }

    // The oldest exchange is gone, the latest is kept.
    let history = engine.session_history("s1").await.unwrap();
    assert!(history.iter().all(|t| !t.text.contains("số 0 ")));
    assert_eq!(history.last().unwrap().text, answer);

    // Prompts carry at most the configured history budget.
    for request in generator.requests() {
        let tokens: usize = request.history.iter().map(|t| t.tokens).sum();
        assert!(tokens <= 40);
    }
}

#[tokio::test]
async fn test_reset_clears_history() {
    let generator = Arc::new(ScriptedGenerator::new(&["Chào bạn."]));
    let engine = ConversationEngine::new(test_config(), capabilities(generator.clone())).unwrap();

    engine.submit_turn("s1", "Xin chào").collect_outcome().await;
    engine.reset_session("s1").unwrap();
    engine.submit_turn("s1", "Xin chào").collect_outcome().await;

    assert!(generator.last_request().history.is_empty());
    assert_eq!(engine.session_history("s1").await.unwrap().len(), 2);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check_reports_each_capability() {
    let engine = ConversationEngine::new(test_config(), capabilities(Arc::new(FailingGenerator))).unwrap();

    let report = engine.health_check().await;

    assert_eq!(report.chunks, 3);
    assert!(!report.is_healthy());
    let names: Vec<&str> = report
        .capabilities
        .iter()
        .map(|c| c.capability.as_str())
        .collect();
    assert_eq!(names, vec!["embed", "dense", "sparse", "rerank", "generate"]);

    let generate = report.capabilities.last().unwrap();
    assert!(!generate.healthy);
    assert!(generate.error.is_some());
    assert_eq!(report.capabilities[3].backend, "disabled");
}
