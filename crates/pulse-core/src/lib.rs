//! Pulse Core Library
//!
//! Shared functionality for the Pulse productivity analyzer:
//! - Environment-driven configuration
//! - Deterministic rule-based scoring of a day's activity
//! - Best-effort insight cache (Redis or in-process)
//! - Pluggable text-generation backends (OpenAI-compatible, mock)
//! - Insight orchestration with retry, validation and fallback

pub mod ai;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod insights;
pub mod models;
pub mod scoring;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{GeneratorBackend, GeneratorClient, MockBackend, MockReply, OpenAICompatibleBackend};
pub use analysis::{Analysis, Analyzer};
pub use cache::{CacheBackend, CacheStore, MemoryBackend, RedisBackend};
pub use config::{
    AppInfo, CacheBackendKind, CacheConfig, Config, GeneratorConfig, RateLimit, RetryConfig,
    RuleThresholds,
};
pub use error::{Error, Result};
pub use insights::{InsightOrchestrator, InsightOutcome, RetryPolicy, Sleeper, TokioSleeper};
pub use models::{
    ActivityRecord, AnalysisResult, InsightResult, InsightSource, RuleExplanation, RuleId,
    ScoreResult, Tag, Task,
};
pub use scoring::{compute_productivity, ScoringEngine};
