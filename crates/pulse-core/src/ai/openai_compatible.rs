//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! - OpenAI (https://api.openai.com)
//! - Groq (https://api.groq.com/openai)
//! - vLLM (http://localhost:8000)
//! - LocalAI / llama-server (http://localhost:8080)
//!
//! # Configuration
//!
//! Environment variables (read by `Config::from_env`):
//! - `LLM_BASE_URL`: Server URL (default: https://api.openai.com)
//! - `LLM_MODEL`: Model name (default: gpt-4.1)
//! - `LLM_API_KEY`: API key (required)
//! - `LLM_TEMPERATURE`, `LLM_MAX_TOKENS`, `LLM_TIMEOUT`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};

use super::GeneratorBackend;

/// OpenAI-compatible backend
///
/// Sends a system message and a user message to `/v1/chat/completions` and
/// returns the first choice's text.
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend without credentials
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    /// Create from generator configuration
    ///
    /// The HTTP client enforces `timeout_secs` on every request.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: Some(config.api_key.clone()),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref api_key) => builder.bearer_auth(api_key),
            None => builder,
        }
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

/// Chat message
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// Chat completion choice
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

/// Chat response message
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl GeneratorBackend for OpenAICompatibleBackend {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response = self
            .request(
                self.http_client
                    .post(format!("{}/v1/chat/completions", self.base_url)),
            )
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = format!("OpenAI API error {}: {}", status, body);
            // 4xx means the request itself is wrong, except timeouts and throttling
            return Err(match status {
                StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                    Error::Generation(message)
                }
                s if s.is_client_error() => Error::Rejected(message),
                _ => Error::Generation(message),
            });
        }

        let chat_response: ChatCompletionResponse = response.json().await?;
        debug!(model = %self.model, "OpenAI-compatible completion received");

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::Generation("No response from OpenAI API".into()))
    }

    async fn health_check(&self) -> bool {
        match self
            .request(self.http_client.get(format!("{}/v1/models", self.base_url)))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(host = %self.base_url, error = %e, "Generator health check failed");
                false
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockGeneratorServer, ServerReply};

    #[test]
    fn test_backend_new() {
        let backend = OpenAICompatibleBackend::new("http://localhost:12434", "llama3.2");
        assert_eq!(backend.model(), "llama3.2");
        assert_eq!(backend.host(), "http://localhost:12434");
    }

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:12434/", "llama3.2");
        assert_eq!(backend.host(), "http://localhost:12434");
    }

    #[test]
    fn test_backend_with_api_key() {
        let backend =
            OpenAICompatibleBackend::with_api_key("http://localhost:12434", "gpt-4", "sk-test123");
        assert_eq!(backend.api_key, Some("sk-test123".to_string()));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:1", "llama3.2");
        assert!(!backend.health_check().await);
    }

    #[test]
    fn test_chat_completion_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-4.1".to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are terse".to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: "Hello".to_string(),
                },
            ],
            temperature: Some(0.0),
            max_tokens: None,
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4.1");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["stream"], false);
        // max_tokens should be omitted when None
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_chat_completion_response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4.1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }]
        }"#;

        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("Hello!"));
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let server = MockGeneratorServer::start().await;
        let backend = OpenAICompatibleBackend::with_api_key(&server.url(), "gpt-4.1", "sk-test");

        let reply = backend.complete("system", "Score: 72.5").await.unwrap();
        assert!(reply.contains("summary"));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4.1");
        assert_eq!(requests[0].system_prompt.as_deref(), Some("system"));
        assert_eq!(requests[0].user_prompt.as_deref(), Some("Score: 72.5"));
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer sk-test"));
    }

    #[tokio::test]
    async fn test_complete_reports_http_errors() {
        let server = MockGeneratorServer::start_with(vec![ServerReply::Status(503)]).await;
        let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4.1");

        let err = backend.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_client_errors_are_rejections() {
        for code in [400, 401, 404] {
            let server = MockGeneratorServer::start_with(vec![ServerReply::Status(code)]).await;
            let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4.1");

            let err = backend.complete("system", "user").await.unwrap_err();
            assert!(matches!(err, Error::Rejected(_)), "status {}", code);
            assert!(!err.is_transient());
        }
    }

    #[tokio::test]
    async fn test_throttling_and_timeouts_stay_transient() {
        for code in [408, 429, 500] {
            let server = MockGeneratorServer::start_with(vec![ServerReply::Status(code)]).await;
            let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4.1");

            let err = backend.complete("system", "user").await.unwrap_err();
            assert!(matches!(err, Error::Generation(_)), "status {}", code);
            assert!(err.is_transient());
        }
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_content() {
        let server = MockGeneratorServer::start_with(vec![ServerReply::Content(String::new())]).await;
        let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4.1");

        assert!(backend.complete("system", "user").await.is_err());
    }

    #[tokio::test]
    async fn test_health_check_mock_server() {
        let server = MockGeneratorServer::start().await;
        let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4.1");
        assert!(backend.health_check().await);
    }
}
