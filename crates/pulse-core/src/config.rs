//! Process configuration
//!
//! Configuration is read once at startup into an immutable [`Config`] value
//! and handed to each component when it is constructed. Nothing in the crate
//! reads the environment after that point.
//!
//! # Environment variables
//!
//! - `LLM_API_KEY`: credential for the text-generation service (required)
//! - `LLM_BASE_URL`: OpenAI-compatible server URL (default: https://api.openai.com)
//! - `LLM_MODEL`: model identifier (default: gpt-4.1)
//! - `LLM_TEMPERATURE`, `LLM_MAX_TOKENS`, `LLM_TIMEOUT` (seconds)
//! - `LLM_RETRIES`: total generation attempts (default: 3)
//! - `LLM_BACKOFF_BASE_SECS`, `LLM_BACKOFF_MAX_SECS`: retry backoff (default: 4, 10)
//! - `CACHE_BACKEND`: `redis` (default) or `memory`
//! - `REDIS_URL`, or `REDIS_HOST` / `REDIS_PORT` / `REDIS_DB` / `REDIS_PASSWORD`
//! - `CACHE_EXPIRE_SECONDS`: insight cache TTL (default: 3600)
//! - `CACHE_MAX_ENTRIES`: in-process cache bound (default: 10000)
//! - `RATE_LIMIT`: per-client API quota such as `5/minute`
//! - `TARGET_DEEP_WORK`, `TARGET_SLEEP`, `MAX_INTERRUPTION`, `MAX_MEETINGS`

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};

/// Complete process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppInfo,
    pub thresholds: RuleThresholds,
    pub cache: CacheConfig,
    pub generator: GeneratorConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimit,
}

/// Application identity, reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "Productivity Rule Engine + LLM".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Thresholds the scoring rules and tags are measured against
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleThresholds {
    /// Target deep work minutes per day
    pub target_deep_work_minutes: f64,
    /// Target sleep hours per night
    pub target_sleep_hours: f64,
    /// Maximum healthy interruptions per day
    pub max_interruptions: f64,
    /// Maximum healthy meeting minutes per day
    pub max_meeting_minutes: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            target_deep_work_minutes: 90.0,
            target_sleep_hours: 7.5,
            max_interruptions: 20.0,
            max_meeting_minutes: 180.0,
        }
    }
}

/// Which cache backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(CacheBackendKind::Redis),
            "memory" | "in_memory" | "inmemory" => Ok(CacheBackendKind::Memory),
            other => Err(Error::Config(format!("Unknown CACHE_BACKEND: {}", other))),
        }
    }
}

/// Insight cache settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub redis_url: String,
    /// Default time-to-live for cached insights
    pub ttl_secs: u64,
    /// Entry bound for the in-process backend
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            redis_url: "redis://localhost:6379/0".to_string(),
            ttl_secs: 3600,
            max_entries: crate::cache::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// External text-generation service settings
#[derive(Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

// Keep the credential out of logs
impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Retry settings for the generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Per-client request quota, parsed from strings like `5/minute`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub period: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests: 5,
            period: Duration::from_secs(60),
        }
    }
}

impl FromStr for RateLimit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("Invalid RATE_LIMIT '{}' (expected e.g. 5/minute)", s));

        let (count, unit) = s.trim().split_once('/').ok_or_else(invalid)?;
        let requests: u32 = count.trim().parse().map_err(|_| invalid())?;
        if requests == 0 {
            return Err(invalid());
        }

        let period = match unit.trim().to_lowercase().as_str() {
            "second" | "sec" | "s" => Duration::from_secs(1),
            "minute" | "min" | "m" => Duration::from_secs(60),
            "hour" | "h" => Duration::from_secs(3600),
            "day" | "d" => Duration::from_secs(86_400),
            _ => return Err(invalid()),
        };

        Ok(Self { requests, period })
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.period.as_secs() {
            1 => "second",
            60 => "minute",
            3600 => "hour",
            86_400 => "day",
            _ => return write!(f, "{}/{}s", self.requests, self.period.as_secs()),
        };
        write!(f, "{}/{}", self.requests, unit)
    }
}

impl RuleThresholds {
    /// Read the four thresholds alone, without requiring a generator key
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            target_deep_work_minutes: parse_or(
                &get,
                "TARGET_DEEP_WORK",
                defaults.target_deep_work_minutes,
            )?,
            target_sleep_hours: parse_or(&get, "TARGET_SLEEP", defaults.target_sleep_hours)?,
            max_interruptions: parse_or(&get, "MAX_INTERRUPTION", defaults.max_interruptions)?,
            max_meeting_minutes: parse_or(&get, "MAX_MEETINGS", defaults.max_meeting_minutes)?,
        })
    }
}

impl CacheConfig {
    /// Read cache settings alone, without requiring a generator key
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            backend: match get("CACHE_BACKEND") {
                Some(v) => v.parse()?,
                None => defaults.backend,
            },
            redis_url: get("REDIS_URL").unwrap_or_else(|| redis_url_from_parts(&get)),
            ttl_secs: parse_or(&get, "CACHE_EXPIRE_SECONDS", defaults.ttl_secs)?,
            max_entries: parse_or(&get, "CACHE_MAX_ENTRIES", defaults.max_entries)?,
        })
    }
}

impl Config {
    /// Build configuration from process environment variables
    ///
    /// Fails when `LLM_API_KEY` is missing or any value does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let app_defaults = AppInfo::default();
        let app = AppInfo {
            name: get("APP_NAME").unwrap_or(app_defaults.name),
            version: get("APP_VERSION").unwrap_or(app_defaults.version),
            environment: get("ENVIRONMENT").unwrap_or(app_defaults.environment),
        };

        let thresholds = RuleThresholds::from_lookup(&get)?;
        let cache = CacheConfig::from_lookup(&get)?;

        let api_key = get("LLM_API_KEY")
            .ok_or_else(|| Error::Config("LLM_API_KEY is required".to_string()))?;
        let generator = GeneratorConfig {
            base_url: get("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: get("LLM_MODEL").unwrap_or_else(|| "gpt-4.1".to_string()),
            temperature: parse_or(&get, "LLM_TEMPERATURE", 0.0)?,
            max_tokens: parse_or(&get, "LLM_MAX_TOKENS", 512)?,
            timeout_secs: parse_or(&get, "LLM_TIMEOUT", 25)?,
        };

        let retry_defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_attempts: parse_or(&get, "LLM_RETRIES", retry_defaults.max_attempts)?,
            base_delay: Duration::from_secs(parse_or(
                &get,
                "LLM_BACKOFF_BASE_SECS",
                retry_defaults.base_delay.as_secs(),
            )?),
            max_delay: Duration::from_secs(parse_or(
                &get,
                "LLM_BACKOFF_MAX_SECS",
                retry_defaults.max_delay.as_secs(),
            )?),
        };

        let rate_limit = match get("RATE_LIMIT") {
            Some(v) => v.parse()?,
            None => RateLimit::default(),
        };

        let config = Self {
            app,
            thresholds,
            cache,
            generator,
            retry,
            rate_limit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that parsing alone cannot express
    pub fn validate(&self) -> Result<()> {
        if self.generator.api_key.trim().is_empty() {
            return Err(Error::Config("LLM_API_KEY is required".to_string()));
        }
        if self.generator.model.trim().is_empty() {
            return Err(Error::Config("LLM_MODEL must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("LLM_RETRIES must be at least 1".to_string()));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("TARGET_DEEP_WORK", t.target_deep_work_minutes),
            ("TARGET_SLEEP", t.target_sleep_hours),
            ("MAX_INTERRUPTION", t.max_interruptions),
            ("MAX_MEETINGS", t.max_meeting_minutes),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}

fn redis_url_from_parts<F>(get: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let host = get("REDIS_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = get("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
    let db = get("REDIS_DB").unwrap_or_else(|| "0".to_string());
    match get("REDIS_PASSWORD") {
        Some(password) => format!(
            "redis://:{}@{}:{}/{}",
            urlencoding::encode(&password),
            host,
            port,
            db
        ),
        None => format!("redis://{}:{}/{}", host, port, db),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("LLM_API_KEY"));
    }

    #[test]
    fn test_blank_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[("LLM_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("LLM_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.thresholds, RuleThresholds::default());
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.cache.redis_url, "redis://localhost:6379/0");
        assert_eq!(config.generator.model, "gpt-4.1");
        assert_eq!(config.generator.timeout_secs, 25);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(4));
        assert_eq!(config.retry.max_delay, Duration::from_secs(10));
        assert_eq!(config.rate_limit, RateLimit::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-test"),
            ("LLM_BASE_URL", "http://localhost:8000/"),
            ("LLM_RETRIES", "5"),
            ("TARGET_DEEP_WORK", "120"),
            ("TARGET_SLEEP", "8"),
            ("CACHE_BACKEND", "memory"),
            ("CACHE_EXPIRE_SECONDS", "60"),
            ("RATE_LIMIT", "100/hour"),
        ]))
        .unwrap();

        assert_eq!(config.generator.base_url, "http://localhost:8000");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.thresholds.target_deep_work_minutes, 120.0);
        assert_eq!(config.thresholds.target_sleep_hours, 8.0);
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.rate_limit.requests, 100);
        assert_eq!(config.rate_limit.period, Duration::from_secs(3600));
    }

    #[test]
    fn test_redis_url_from_parts() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-test"),
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_DB", "2"),
            ("REDIS_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        assert_eq!(config.cache.redis_url, "redis://:hunter2@cache.internal:6380/2");
    }

    #[test]
    fn test_redis_password_is_percent_encoded() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-test"),
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PASSWORD", "p@ss/w0rd?#"),
        ]))
        .unwrap();
        assert_eq!(
            config.cache.redis_url,
            "redis://:p%40ss%2Fw0rd%3F%23@cache.internal:6379/0"
        );
        assert!(crate::cache::RedisBackend::new(&config.cache.redis_url).is_ok());
    }

    #[test]
    fn test_invalid_number_is_fatal() {
        let err = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-test"),
            ("TARGET_SLEEP", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TARGET_SLEEP"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-test"),
            ("LLM_RETRIES", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LLM_RETRIES"));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-test"),
            ("MAX_MEETINGS", "-30"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAX_MEETINGS"));
    }

    #[test]
    fn test_rate_limit_parsing() {
        assert_eq!(
            "5/minute".parse::<RateLimit>().unwrap(),
            RateLimit {
                requests: 5,
                period: Duration::from_secs(60)
            }
        );
        assert_eq!("10/second".parse::<RateLimit>().unwrap().period, Duration::from_secs(1));
        assert!("0/minute".parse::<RateLimit>().is_err());
        assert!("five/minute".parse::<RateLimit>().is_err());
        assert!("5 per minute".parse::<RateLimit>().is_err());
        assert_eq!(RateLimit::default().to_string(), "5/minute");
    }

    #[test]
    fn test_partial_loaders_need_no_api_key() {
        let thresholds =
            RuleThresholds::from_lookup(lookup(&[("TARGET_SLEEP", "8.5")])).unwrap();
        assert_eq!(thresholds.target_sleep_hours, 8.5);
        assert_eq!(thresholds.max_meeting_minutes, 180.0);

        let cache = CacheConfig::from_lookup(lookup(&[("CACHE_BACKEND", "memory")])).unwrap();
        assert_eq!(cache.backend, CacheBackendKind::Memory);
        assert_eq!(cache.ttl_secs, 3600);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config::from_lookup(lookup(&[("LLM_API_KEY", "sk-secret")])).unwrap();
        let rendered = format!("{:?}", config.generator);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("redacted"));
    }
}
