//! Mock backend for testing
//!
//! Replies from a scripted queue, then falls back to a fixed valid insight.
//! Useful for unit tests and development without a generator service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::GeneratorBackend;

/// Reply returned when the script is empty
pub const DEFAULT_MOCK_REPLY: &str = r#"{"summary": "Solid day with room to protect focus time.", "recommendations": ["Batch meetings into one block", "Keep a consistent bedtime"], "key_points": ["Deep work met the target", "Interruptions were moderate"]}"#;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text as the completion
    Text(String),
    /// Fail with a generation error carrying this message
    Fail(String),
    /// Fail as if the service refused the request (not retried)
    Reject(String),
    /// Return this text after a delay, so concurrent calls overlap
    Delayed(Duration, String),
    /// Never complete (for timeout and cancellation tests)
    Hang,
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockReply::Fail(message.into())
    }
}

/// Mock generator backend
///
/// Clones share the script, call counter and prompt log, so a test can keep
/// one handle while the orchestrator owns another.
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    model: String,
    script: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            model: "mock".to_string(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Create a mock that plays `replies` in order before using the default
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let backend = Self::new();
        backend.push_replies(replies);
        backend
    }

    /// Append replies to the script
    pub fn push_replies(&self, replies: impl IntoIterator<Item = MockReply>) {
        lock(&self.script).extend(replies);
    }

    /// Number of `complete` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received, in call order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl GeneratorBackend for MockBackend {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(user_prompt.to_string());

        let next = lock(&self.script).pop_front();
        match next {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(message)) => Err(Error::Generation(message)),
            Some(MockReply::Reject(message)) => Err(Error::Rejected(message)),
            Some(MockReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Some(MockReply::Hang) => std::future::pending().await,
            None => Ok(DEFAULT_MOCK_REPLY.to_string()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
