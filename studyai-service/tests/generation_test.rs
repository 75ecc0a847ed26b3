use std::sync::Arc;
use std::time::Duration;

use studyai_service::models::{FlashcardSet, Quiz, WorkCheck};
use studyai_service::services::{GenerationEngine, MockTextProvider, ProviderError};

fn engine_with(provider: Arc<MockTextProvider>) -> GenerationEngine {
    // Zero delay keeps the retry loop fast under test.
    GenerationEngine::new(provider, 3, Duration::ZERO)
}

#[tokio::test]
async fn parses_well_formed_output_on_first_attempt() {
    let provider = Arc::new(MockTextProvider::with_responses([Ok(
        r#"{"flashcards":[{"front":"Hlavné mesto SR?","back":"Bratislava"}]}"#.to_string(),
    )]));
    let engine = engine_with(provider.clone());

    let set: FlashcardSet = engine
        .generate("prompt", "flashcards", serde_json::json!({}))
        .await
        .unwrap();

    assert_eq!(set.flashcards.len(), 1);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn retries_malformed_json_then_succeeds() {
    let provider = Arc::new(MockTextProvider::with_responses([
        Ok("this is not json".to_string()),
        Ok(r#"{"questions":[{"question":"2+2?","options":["3","4","5","6"],"correct_index":1,"explanation":"."}]}"#.to_string()),
    ]));
    let engine = engine_with(provider.clone());

    let quiz: Quiz = engine
        .generate("prompt", "quiz", serde_json::json!({}))
        .await
        .unwrap();

    assert_eq!(quiz.questions.len(), 1);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn retries_rate_limit_then_succeeds() {
    let provider = Arc::new(MockTextProvider::with_responses([
        Err(ProviderError::RateLimited),
        Ok(r#"{"correct":false,"feedback":"Skús znova.","errors":[]}"#.to_string()),
    ]));
    let engine = engine_with(provider.clone());

    let check: WorkCheck = engine
        .generate("prompt", "work_check", serde_json::json!({}))
        .await
        .unwrap();

    assert!(!check.correct);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn gives_up_after_attempt_budget() {
    let provider = Arc::new(MockTextProvider::with_responses([
        Ok("nope".to_string()),
        Ok("still nope".to_string()),
        Ok("never".to_string()),
    ]));
    let engine = engine_with(provider.clone());

    let result = engine
        .generate::<FlashcardSet>("prompt", "flashcards", serde_json::json!({}))
        .await;

    assert!(result.is_err());
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn non_retryable_provider_error_is_fatal() {
    let provider = Arc::new(MockTextProvider::with_responses([
        Err(ProviderError::ApiError("boom".to_string())),
        Ok(r#"{"flashcards":[]}"#.to_string()),
    ]));
    let engine = engine_with(provider.clone());

    let result = engine
        .generate::<FlashcardSet>("prompt", "flashcards", serde_json::json!({}))
        .await;

    // One call, no retry: the scripted success is never consumed.
    assert!(result.is_err());
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn content_filter_is_fatal() {
    let provider = Arc::new(MockTextProvider::with_responses([Err(
        ProviderError::ContentFiltered,
    )]));
    let engine = engine_with(provider.clone());

    let result = engine
        .generate::<FlashcardSet>("prompt", "flashcards", serde_json::json!({}))
        .await;

    assert!(result.is_err());
    assert_eq!(provider.call_count(), 1);
}
