//! Pluggable text-generation backend abstraction
//!
//! This module provides a backend-agnostic interface for the external
//! service that writes insights. Any service that accepts a system
//! instruction plus a user prompt and returns text is interchangeable.
//!
//! # Architecture
//!
//! - `GeneratorBackend` trait: defines the interface for all backends
//! - `GeneratorClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let client = GeneratorClient::from_config(&config.generator)?;
//!
//! let reply = client.complete(SYSTEM_PROMPT, "Score: 72.5 ...").await?;
//! let insight = parsing::parse_insight(&reply)?;
//! ```

mod mock;
mod openai_compatible;
pub mod parsing;

pub use mock::{MockBackend, MockReply, DEFAULT_MOCK_REPLY};
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::config::GeneratorConfig;
use crate::error::Result;

/// Trait defining the interface for all text-generation backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait GeneratorBackend: Send + Sync {
    /// Run one completion and return the raw reply text
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete generator client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum GeneratorClient {
    /// OpenAI-compatible chat completions API (OpenAI, Groq, vLLM, LocalAI, ...)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl GeneratorClient {
    /// Create the production client from configuration
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        OpenAICompatibleBackend::from_config(config).map(GeneratorClient::OpenAICompatible)
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        GeneratorClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl GeneratorBackend for GeneratorClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        match self {
            GeneratorClient::OpenAICompatible(b) => b.complete(system_prompt, user_prompt).await,
            GeneratorClient::Mock(b) => b.complete(system_prompt, user_prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            GeneratorClient::OpenAICompatible(b) => b.health_check().await,
            GeneratorClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            GeneratorClient::OpenAICompatible(b) => b.model(),
            GeneratorClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            GeneratorClient::OpenAICompatible(b) => b.host(),
            GeneratorClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_client_mock() {
        let client = GeneratorClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = GeneratorClient::mock();
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_mock_reply_parses() {
        let client = GeneratorClient::mock();
        let reply = client.complete("system", "Score: 50").await.unwrap();
        let insight = parsing::parse_insight(&reply).unwrap();
        assert!(!insight.summary.is_empty());
    }

    #[test]
    fn test_from_config_builds_openai_client() {
        let config = GeneratorConfig {
            base_url: "http://localhost:8000".into(),
            api_key: "sk-test".into(),
            model: "gpt-4.1".into(),
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 25,
        };
        let client = GeneratorClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "gpt-4.1");
        assert_eq!(client.host(), "http://localhost:8000");
    }
}
