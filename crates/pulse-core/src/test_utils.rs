//! Test utilities for pulse-core
//!
//! This module provides testing infrastructure including a mock
//! OpenAI-compatible server, instrumented cache backends and a sleeper that
//! records backoff delays instead of waiting.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Json, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::DEFAULT_MOCK_REPLY;
use crate::cache::{CacheBackend, MemoryBackend};
use crate::error::{Error, Result};
use crate::insights::Sleeper;

/// What the mock server answers to one chat completion request
#[derive(Debug, Clone)]
pub enum ServerReply {
    /// 200 with this text as the assistant message
    Content(String),
    /// An error status with a short body
    Status(u16),
}

/// A chat completion request as the mock server saw it
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct ServerState {
    replies: Mutex<VecDeque<ServerReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Mock OpenAI-compatible server for testing and development
///
/// Answers `/v1/chat/completions` from a reply queue, falling back to a
/// valid insight once the queue is empty, and `/v1/models` for health checks.
pub struct MockGeneratorServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockGeneratorServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(Vec::new()).await
    }

    /// Start the mock server with scripted replies
    pub async fn start_with(replies: Vec<ServerReply>) -> Self {
        let state = Arc::new(ServerState {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockGeneratorServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Model listing endpoint (health check)
async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "gpt-4.1", "object": "model", "owned_by": "mock"}]
    }))
}

fn message_content(request: &Value, role: &str) -> Option<String> {
    request["messages"]
        .as_array()?
        .iter()
        .find(|m| m["role"] == role)
        .and_then(|m| m["content"].as_str())
        .map(str::to_string)
}

/// Chat completions endpoint
async fn handle_chat(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        model: request["model"].as_str().unwrap_or_default().to_string(),
        system_prompt: message_content(&request, "system"),
        user_prompt: message_content(&request, "user"),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let reply = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| ServerReply::Content(DEFAULT_MOCK_REPLY.to_string()));

    match reply {
        ServerReply::Content(content) => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": request["model"],
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        ServerReply::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({"error": {"message": "mock failure"}}))).into_response()
        }
    }
}

/// Sleeper that records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// In-memory cache backend that counts operations
#[derive(Debug, Default)]
pub struct CountingBackend {
    inner: MemoryBackend,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackend for CountingBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Cache backend whose every operation fails, like an unreachable server
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingBackend;

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::InvalidData("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        Err(Error::InvalidData("connection refused".into()))
    }

    async fn ping(&self) -> Result<()> {
        Err(Error::InvalidData("connection refused".into()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
