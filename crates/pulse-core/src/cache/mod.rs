//! Best-effort insight cache
//!
//! The cache is an accelerator, not a system of record. Every caller key is
//! hashed with SHA-256 before it reaches the backend, values are stored as
//! JSON, and backend failures never escape this module:
//!
//! - a failed or undecodable `get` is a miss
//! - a failed `set` is logged and dropped
//!
//! # Architecture
//!
//! - `CacheBackend` trait: raw string get/set with TTL against some store
//! - Backend implementations: `RedisBackend`, `MemoryBackend`
//! - `CacheStore`: key hashing, JSON encoding, default TTL, fail-open policy

mod memory;
mod redis_backend;

pub use self::memory::{CacheEntry, MemoryBackend, DEFAULT_MAX_ENTRIES};
pub use self::redis_backend::RedisBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::Result;

/// Prefix applied to every hashed key in the backing store
pub const KEY_PREFIX: &str = "cache:";

/// Raw key/value storage with expiry
///
/// Implementations must make each `get`/`set` atomic per key; callers do no
/// locking of their own.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read the value stored under `key`, if present and not expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Release connections held by the backend
    async fn close(&self) -> Result<()>;

    /// Short backend name (for logging)
    fn name(&self) -> &'static str;
}

/// Hashed-key JSON cache with fail-open semantics
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
}

impl CacheStore {
    /// Wrap a backend with the given default TTL
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
        }
    }

    /// Build the configured backend
    ///
    /// Redis connects lazily, so an unreachable server here still yields a
    /// working store that misses on every read. Only a malformed URL fails.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Redis => Arc::new(RedisBackend::new(&config.redis_url)?),
            CacheBackendKind::Memory => Arc::new(MemoryBackend::new(config.max_entries)),
        };
        Ok(Self::new(backend, Duration::from_secs(config.ttl_secs)))
    }

    /// In-process store, mostly for tests and single-process runs
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryBackend::default()), default_ttl)
    }

    /// Hash a caller key into its backing-store form
    pub fn make_key(raw_key: &str) -> String {
        let digest = Sha256::digest(raw_key.as_bytes());
        format!("{}{}", KEY_PREFIX, hex::encode(digest))
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Fetch and decode a value
    ///
    /// Returns `None` on a miss, a backend error, or a value that no longer
    /// decodes as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let hashed = Self::make_key(key);

        let raw = match self.backend.get(&hashed).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %hashed, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %hashed, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %hashed, error = %e, "Cached value did not decode, treating as miss");
                None
            }
        }
    }

    /// Encode and store a value; failures are logged and swallowed
    ///
    /// Uses the store's default TTL when `ttl` is `None`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let hashed = Self::make_key(key);
        let ttl = ttl.unwrap_or(self.default_ttl);

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %hashed, error = %e, "Failed to encode cache value");
                return;
            }
        };

        match self.backend.set(&hashed, &payload, ttl).await {
            Ok(()) => debug!(key = %hashed, ttl_secs = ttl.as_secs(), "Cache write"),
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Cache write failed, ignoring")
            }
        }
    }

    /// Whether the backing store answers
    pub async fn ping(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                debug!(backend = self.backend.name(), error = %e, "Cache ping failed");
                false
            }
        }
    }

    /// Close the backing store connection
    pub async fn close(&self) {
        if let Err(e) = self.backend.close().await {
            warn!(backend = self.backend.name(), error = %e, "Failed to close cache backend");
        }
    }
}
