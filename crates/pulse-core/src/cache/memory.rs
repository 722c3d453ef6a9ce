//! In-process cache backend using moka
//!
//! Bounded by entry count, with a per-entry TTL taken from each `set` call.
//! Expired and evicted entries are reclaimed by moka's housekeeping, so keys
//! that are never read again do not accumulate.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;

use crate::error::Result;

use super::CacheBackend;

/// Default entry bound when none is configured
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Longest TTL honoured; anything above is clamped (ten years)
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// A stored value and how long it lives from its last write
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    pub ttl: Duration,
}

/// Expire each entry after the TTL it was written with
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Cache backend living in process memory
#[derive(Clone)]
pub struct MemoryBackend {
    cache: Cache<String, CacheEntry>,
}

impl MemoryBackend {
    /// Create a backend holding at most `max_entries` values
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Number of live entries, as of the last housekeeping run
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending evictions and expirations now
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let entry = CacheEntry {
            value: value.to_string(),
            ttl: ttl.min(MAX_TTL),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.cache.invalidate_all();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_returns_stored_value() {
        let backend = MemoryBackend::default();
        backend.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));

        backend.run_pending_tasks().await;
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_served() {
        let backend = MemoryBackend::default();
        backend.set("k", "v", Duration::ZERO).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_reclaimed_without_reads() {
        let backend = MemoryBackend::default();
        for i in 0..1000 {
            backend
                .set(&format!("old-{}", i), "v", Duration::ZERO)
                .await
                .unwrap();
        }
        backend.set("fresh", "v", Duration::from_secs(60)).await.unwrap();

        backend.run_pending_tasks().await;
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get("fresh").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let backend = MemoryBackend::new(10);
        for i in 0..200 {
            backend
                .set(&format!("k-{}", i), "v", Duration::from_secs(60))
                .await
                .unwrap();
        }

        backend.run_pending_tasks().await;
        assert!(backend.len() <= 10);
    }

    #[tokio::test]
    async fn test_rewrite_takes_new_ttl() {
        let backend = MemoryBackend::default();
        backend.set("k", "old", Duration::from_secs(60)).await.unwrap();
        backend.set("k", "new", Duration::ZERO).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let backend = MemoryBackend::default();
        backend.set("k", "v", Duration::MAX).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_close_clears_entries() {
        let backend = MemoryBackend::default();
        backend.set("k", "v", Duration::from_secs(60)).await.unwrap();
        backend.close().await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }
}
