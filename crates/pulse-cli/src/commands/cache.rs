//! Cache command implementations

use anyhow::{bail, Result};
use pulse_core::{CacheConfig, CacheStore};

pub async fn cmd_cache_ping(config: &CacheConfig) -> Result<()> {
    let cache = CacheStore::from_config(config)?;
    let reachable = cache.ping().await;
    cache.close().await;

    if reachable {
        println!("✅ Cache reachable ({})", cache.backend_name());
        Ok(())
    } else {
        bail!("Cache not responding ({})", cache.backend_name())
    }
}
