//! Integration tests for pulse-core
//!
//! These tests exercise the full config → score → insight → cache workflow
//! against an in-process OpenAI-compatible server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pulse_core::test_utils::{MockGeneratorServer, RecordingSleeper, ServerReply};
use pulse_core::{
    ActivityRecord, Analyzer, CacheStore, Config, GeneratorClient, InsightOrchestrator,
    InsightSource, RetryPolicy, ScoringEngine, Tag,
};

fn config_for(server: &MockGeneratorServer) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("LLM_API_KEY", "sk-integration".to_string()),
        ("LLM_BASE_URL", server.url()),
        ("LLM_MODEL", "gpt-4.1-mini".to_string()),
        ("LLM_TIMEOUT", "5".to_string()),
        ("CACHE_BACKEND", "memory".to_string()),
    ]);
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

/// Analyzer wired like production, except for a sleeper that does not wait
fn analyzer_for(config: &Config) -> Analyzer {
    let cache = CacheStore::from_config(&config.cache).unwrap();
    let generator = GeneratorClient::from_config(&config.generator).unwrap();
    let retry = RetryPolicy::from_config(&config.retry)
        .with_sleeper(Arc::new(RecordingSleeper::default()));
    let orchestrator = InsightOrchestrator::new(generator, cache, retry)
        .with_attempt_timeout(Duration::from_secs(config.generator.timeout_secs));
    Analyzer::new(ScoringEngine::new(config.thresholds), orchestrator)
}

fn focused_day() -> ActivityRecord {
    serde_json::from_value(serde_json::json!({
        "user_id": "123",
        "date_range": "2024-01-01",
        "tasks": [
            {"id": "1", "title": "Write tests", "planned_minutes": 60, "actual_minutes": 50, "completed": true},
            {"id": "2", "title": "Review PR", "planned_minutes": 30, "completed": true}
        ],
        "deep_work_minutes": 240,
        "meetings_minutes": 30,
        "interruptions": 2,
        "sleep_hours": 9.5,
        "breaks_minutes": 150,
        "mood": 10
    }))
    .unwrap()
}

// =============================================================================
// End-to-end analysis
// =============================================================================

#[tokio::test]
async fn test_analyze_round_trip_through_generator() {
    let server = MockGeneratorServer::start().await;
    let config = config_for(&server);
    let analyzer = analyzer_for(&config);

    let analysis = analyzer.analyze(&focused_day()).await.unwrap();

    assert_eq!(analysis.source, InsightSource::Generated);
    assert!(analysis.result.tags.contains(&Tag::Focused));
    assert!(analysis.result.tags.contains(&Tag::WellBalanced));
    assert!(!analysis.result.llm.summary.is_empty());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-4.1-mini");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer sk-integration"));
    let prompt = requests[0].user_prompt.as_deref().unwrap();
    assert!(prompt.contains("Tags: Focused, WellBalanced"));
    assert!(prompt.contains("deep_work (+15.00)"));
}

#[tokio::test]
async fn test_second_identical_request_is_served_from_cache() {
    let server = MockGeneratorServer::start().await;
    let analyzer = analyzer_for(&config_for(&server));

    let first = analyzer.analyze(&focused_day()).await.unwrap();
    let second = analyzer.analyze(&focused_day()).await.unwrap();

    assert!(!first.cache_hit());
    assert!(second.cache_hit());
    assert_eq!(first.result, second.result);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_flaky_generator_is_retried() {
    let server = MockGeneratorServer::start_with(vec![
        ServerReply::Status(500),
        ServerReply::Content("Sorry, I can't produce JSON today.".into()),
    ])
    .await;
    let analyzer = analyzer_for(&config_for(&server));

    let analysis = analyzer.analyze(&focused_day()).await.unwrap();

    assert_eq!(analysis.source, InsightSource::Generated);
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn test_unavailable_generator_degrades_and_is_not_cached() {
    let server = MockGeneratorServer::start_with(vec![
        ServerReply::Status(503),
        ServerReply::Status(503),
        ServerReply::Status(503),
    ])
    .await;
    let analyzer = analyzer_for(&config_for(&server));

    let degraded = analyzer.analyze(&focused_day()).await.unwrap();
    assert_eq!(degraded.source, InsightSource::Fallback);
    assert_eq!(degraded.result.llm.summary, "AI error occurred.");
    assert!(degraded.result.llm.recommendations[0].starts_with("Error: "));
    assert!(degraded.result.llm.key_points.is_empty());

    // Replies are back to normal; the fallback must not have been cached
    let recovered = analyzer.analyze(&focused_day()).await.unwrap();
    assert_eq!(recovered.source, InsightSource::Generated);
    assert_eq!(server.requests().len(), 4);
}

#[tokio::test]
async fn test_rejected_credentials_fall_back_without_retry() {
    let server = MockGeneratorServer::start_with(vec![ServerReply::Status(401)]).await;
    let analyzer = analyzer_for(&config_for(&server));

    let analysis = analyzer.analyze(&focused_day()).await.unwrap();

    assert_eq!(analysis.source, InsightSource::Fallback);
    assert!(analysis.result.llm.recommendations[0].contains("401"));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_unreachable_generator_degrades() {
    let mut server = MockGeneratorServer::start().await;
    let config = config_for(&server);
    server.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let analysis = analyzer_for(&config).analyze(&focused_day()).await.unwrap();
    assert_eq!(analysis.source, InsightSource::Fallback);
}

// =============================================================================
// Scoring invariants
// =============================================================================

#[test]
fn test_score_is_base_plus_deltas_for_varied_days() {
    let engine = ScoringEngine::default();

    for (deep, meetings, interruptions, sleep, breaks, mood) in [
        (0, 0, 0, 0.0, 0, None),
        (600, 600, 200, 24.0, 600, Some(10)),
        (90, 180, 20, 7.5, 0, Some(5)),
        (30, 400, 50, 3.0, 10, Some(1)),
    ] {
        let record = ActivityRecord {
            user_id: None,
            date_range: None,
            tasks: vec![],
            deep_work_minutes: deep,
            meetings_minutes: meetings,
            interruptions,
            sleep_hours: sleep,
            breaks_minutes: breaks,
            mood,
            notes: None,
        };
        let result = engine.score(&record);
        let raw: f64 = 50.0 + result.explanations.iter().map(|e| e.effect_on_score).sum::<f64>();

        assert!((0.0..=100.0).contains(&result.score));
        assert!((result.score - raw.clamp(0.0, 100.0)).abs() < 1e-9);
        assert_eq!(result.explanations.len(), if mood.is_some() { 7 } else { 6 });
    }
}
