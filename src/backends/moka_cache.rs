//! Moka Cache - In-Memory Cache Backend
//!
//! Default backend of the tenant cache, built on Moka's async cache.

use super::CacheEntry;
use crate::traits::CacheBackend;
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for `MokaCache`
#[derive(Debug, Clone, Copy)]
pub struct MokaCacheConfig {
    /// Max number of entries before Moka starts evicting
    pub max_capacity: u64,
    /// Upper bound on any entry's lifetime, regardless of its own TTL
    pub time_to_live: Duration,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_live: Duration::from_secs(3 * 3600),
        }
    }
}

/// Moka in-memory cache with per-key TTL support
///
/// Per-key TTLs are evaluated on read against each [`CacheEntry`]; Moka's own
/// `time_to_live` only acts as a safety net for entries nobody reads again.
pub struct MokaCache {
    cache: Cache<String, CacheEntry>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl MokaCache {
    /// Create new Moka cache
    pub fn new(config: MokaCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.time_to_live)
            .build();

        info!(
            capacity = config.max_capacity,
            "Moka Cache initialized with per-key TTL support"
        );

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `(hits, misses, sets)`
    pub fn counters(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
        )
    }
}

impl Default for MokaCache {
    fn default() -> Self {
        Self::new(MokaCacheConfig::default())
    }
}

#[async_trait]
impl CacheBackend for MokaCache {
    async fn get_with_ttl(&self, key: &str) -> Option<(Vec<u8>, Duration)> {
        if let Some(entry) = self.cache.get(key).await {
            if entry.is_expired() {
                let _ = self.cache.remove(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "[Moka] Evicted expired key");
                None
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let remaining = entry.remaining_ttl();
                Some((entry.into_value(), remaining))
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value.to_vec(), ttl);
        self.cache.insert(key.to_string(), entry).await;
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[Moka] Cached key with TTL");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.cache.remove(key).await;
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in &keys {
            self.cache.remove(key.as_str()).await;
        }
        debug!(prefix = %prefix, count = keys.len(), "[Moka] Removed keys by prefix");
        Ok(keys)
    }

    async fn health_check(&self) -> bool {
        let test_key = "health_check_moka";
        let test_value = b"{\"test\":true}";

        match self
            .set_with_ttl(test_key, test_value, Duration::from_secs(60))
            .await
        {
            Ok(()) => match self.get(test_key).await {
                Some(retrieved) => {
                    let _ = self.remove(test_key).await;
                    retrieved == test_value
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "Moka"
    }
}
