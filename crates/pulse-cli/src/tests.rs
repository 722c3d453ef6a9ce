//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use pulse_core::test_utils::{MockGeneratorServer, ServerReply};
use pulse_core::{CacheBackendKind, CacheConfig, Config, InsightSource, RuleThresholds};
use tempfile::NamedTempFile;

use crate::commands;

fn record_json() -> serde_json::Value {
    serde_json::json!({
        "user_id": "123",
        "date_range": "2024-01-01",
        "tasks": [
            {"id": "1", "title": "Task 1", "planned_minutes": 60, "actual_minutes": 50, "completed": true},
            {"id": "2", "title": "Task 2", "planned_minutes": 30, "completed": false}
        ],
        "deep_work_minutes": 120,
        "meetings_minutes": 60,
        "interruptions": 3,
        "sleep_hours": 7,
        "breaks_minutes": 30,
        "mood": 7
    })
}

fn write_record(value: &serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", value).unwrap();
    file
}

fn config_with(vars: &[(&str, String)]) -> Config {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Config::from_lookup(|key| map.get(key).cloned()).unwrap()
}

fn config_for(server: &MockGeneratorServer) -> Config {
    config_with(&[
        ("LLM_API_KEY", "sk-cli-test".to_string()),
        ("LLM_BASE_URL", server.url()),
        ("CACHE_BACKEND", "memory".to_string()),
    ])
}

// ========== Env File Tests ==========

#[test]
fn test_load_env_file_sets_variables() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "PULSE_CLI_ENV_FILE_MARKER=loaded").unwrap();

    let loaded = commands::load_env_file(Some(file.path())).unwrap();
    assert_eq!(loaded.as_deref(), Some(file.path()));
    assert_eq!(
        std::env::var("PULSE_CLI_ENV_FILE_MARKER").as_deref(),
        Ok("loaded")
    );
}

#[test]
fn test_load_env_file_explicit_missing_is_error() {
    let err = commands::load_env_file(Some(&PathBuf::from("/nonexistent/pulse.env"))).unwrap_err();
    assert!(err.to_string().contains("Failed to read env file"));
}

// ========== Record Loading Tests ==========

#[test]
fn test_load_record() {
    let file = write_record(&record_json());
    let record = commands::load_record(file.path()).unwrap();
    assert_eq!(record.tasks.len(), 2);
    assert_eq!(record.mood, Some(7));
}

#[test]
fn test_load_record_missing_file() {
    let err = commands::load_record(&PathBuf::from("/nonexistent/day.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
}

#[test]
fn test_load_record_rejects_malformed_json() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{not json").unwrap();

    let err = commands::load_record(file.path()).unwrap_err();
    assert!(err.to_string().contains("Invalid activity record"));
}

#[test]
fn test_load_record_rejects_out_of_range_mood() {
    let mut value = record_json();
    value["mood"] = serde_json::json!(11);
    let file = write_record(&value);

    let err = commands::load_record(file.path()).unwrap_err();
    assert!(err.to_string().contains("mood"));
}

// ========== Score Command Tests ==========

#[test]
fn test_score_file() {
    let file = write_record(&record_json());
    let result = commands::score_file(file.path(), &RuleThresholds::default()).unwrap();

    assert!((0.0..=100.0).contains(&result.score));
    assert_eq!(result.explanations.len(), 7);
}

#[test]
fn test_score_file_uses_thresholds() {
    let file = write_record(&record_json());
    let lenient = RuleThresholds {
        target_sleep_hours: 6.0,
        ..RuleThresholds::default()
    };

    let strict = commands::score_file(file.path(), &RuleThresholds::default()).unwrap();
    let relaxed = commands::score_file(file.path(), &lenient).unwrap();
    assert!(relaxed.score > strict.score);
}

#[test]
fn test_cmd_score() {
    let file = write_record(&record_json());
    assert!(commands::cmd_score(file.path(), &RuleThresholds::default(), false).is_ok());
    assert!(commands::cmd_score(file.path(), &RuleThresholds::default(), true).is_ok());
}

// ========== Analyze Command Tests ==========

#[tokio::test]
async fn test_analyze_file() {
    let server = MockGeneratorServer::start().await;
    let config = config_for(&server);
    let file = write_record(&record_json());

    let analysis = commands::analyze_file(&config, file.path()).await.unwrap();

    assert_eq!(analysis.source, InsightSource::Generated);
    assert!(!analysis.result.llm.summary.is_empty());
    assert_eq!(server.requests().len(), 1);
    assert_eq!(
        server.requests()[0].authorization.as_deref(),
        Some("Bearer sk-cli-test")
    );
}

#[tokio::test]
async fn test_analyze_file_falls_back_when_generator_fails() {
    let server = MockGeneratorServer::start_with(vec![ServerReply::Status(503)]).await;
    let config = config_with(&[
        ("LLM_API_KEY", "sk-cli-test".to_string()),
        ("LLM_BASE_URL", server.url()),
        ("LLM_RETRIES", "1".to_string()),
        ("CACHE_BACKEND", "memory".to_string()),
    ]);
    let file = write_record(&record_json());

    let analysis = commands::analyze_file(&config, file.path()).await.unwrap();

    assert_eq!(analysis.source, InsightSource::Fallback);
    assert_eq!(analysis.result.llm.summary, "AI error occurred.");
}

#[tokio::test]
async fn test_cmd_analyze() {
    let server = MockGeneratorServer::start().await;
    let config = config_for(&server);
    let file = write_record(&record_json());

    assert!(commands::cmd_analyze(&config, file.path(), false).await.is_ok());
}

#[tokio::test]
async fn test_analyze_rejects_invalid_record_before_generation() {
    let server = MockGeneratorServer::start().await;
    let config = config_for(&server);
    let mut value = record_json();
    value["sleep_hours"] = serde_json::json!(30);
    let file = write_record(&value);

    assert!(commands::analyze_file(&config, file.path()).await.is_err());
    assert!(server.requests().is_empty());
}

// ========== Cache Command Tests ==========

#[tokio::test]
async fn test_cmd_cache_ping_memory() {
    let config = CacheConfig {
        backend: CacheBackendKind::Memory,
        ..CacheConfig::default()
    };
    assert!(commands::cmd_cache_ping(&config).await.is_ok());
}

#[tokio::test]
async fn test_cmd_cache_ping_unreachable_redis() {
    let config = CacheConfig {
        backend: CacheBackendKind::Redis,
        redis_url: "redis://127.0.0.1:1/0".to_string(),
        ..CacheConfig::default()
    };
    let err = commands::cmd_cache_ping(&config).await.unwrap_err();
    assert!(err.to_string().contains("not responding"));
}

// ========== Config Command Tests ==========

#[test]
fn test_config_lines_redact_credentials() {
    let config = config_with(&[
        ("LLM_API_KEY", "sk-very-secret".to_string()),
        ("REDIS_PASSWORD", "hunter2".to_string()),
    ]);

    let rendered = commands::config_lines(&config).join("\n");
    assert!(!rendered.contains("sk-very-secret"));
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("Rate limit: 5/minute"));
    assert!(rendered.contains("gpt-4.1"));
}
