//! Redis cache backend
//!
//! Holds one lazily-established `ConnectionManager` shared by every request.
//! The manager reconnects on its own after a dropped connection; if the first
//! connection attempt fails, the next operation tries again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::CacheBackend;

/// Upper bound on any single Redis round trip
const OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Cache backend backed by a Redis server
pub struct RedisBackend {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    closed: AtomicBool,
}

impl RedisBackend {
    /// Create a backend for `url` (e.g. `redis://localhost:6379/0`)
    ///
    /// Only validates the URL; no connection is opened until first use.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Config(format!("Invalid Redis URL: {}", e)))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            closed: AtomicBool::new(false),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::InvalidData("Redis backend is closed".into()));
        }

        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = with_timeout(ConnectionManager::new(self.client.clone())).await?;
                info!("Connected to Redis cache");
                Ok::<_, Error>(manager)
            })
            .await?;

        // ConnectionManager is a cheap handle over a shared multiplexed connection
        Ok(manager.clone())
    }
}

async fn with_timeout<T, F>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(OPERATION_TIMEOUT, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout(OPERATION_TIMEOUT)),
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        with_timeout(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        // Redis rejects an expiry of zero
        let seconds = ttl.as_secs().max(1);
        with_timeout(conn.set_ex::<_, _, ()>(key, value, seconds)).await
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let reply: String = with_timeout(redis::cmd("PING").query_async(&mut conn)).await?;
        debug!(reply = %reply, "Redis ping");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Connections are released when the last handle drops
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
