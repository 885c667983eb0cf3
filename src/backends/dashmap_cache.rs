//! `DashMap` Cache - Simple Concurrent `HashMap` Backend
//!
//! A lightweight in-memory store using `DashMap` for concurrent access.

use super::CacheEntry;
use crate::traits::CacheBackend;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Simple concurrent cache using `DashMap`
///
/// **Features**:
/// - Lock-free concurrent reads/writes
/// - Lazy TTL eviction on read, plus [`cleanup_expired`](Self::cleanup_expired)
///
/// **Limitations**:
/// - No size limit; prefer [`MokaCache`](super::MokaCache) for long-lived processes
#[derive(Clone)]
pub struct DashMapCache {
    map: Arc<DashMap<String, CacheEntry>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl DashMapCache {
    pub fn new() -> Self {
        info!("Initializing DashMap Cache (concurrent HashMap)");

        Self {
            map: Arc::new(DashMap::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.map.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "[DashMap] Cleaned up expired entries");
        }
        removed
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether a raw key is physically present, ignoring expiry.
    #[must_use]
    pub fn contains_raw(&self, key: &str) -> bool {
        self.map.contains_key(key)
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

impl Default for DashMapCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for DashMapCache {
    async fn get_with_ttl(&self, key: &str) -> Option<(Vec<u8>, Duration)> {
        let expired = match self.map.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let entry = entry.value();
                return Some((entry.value().to_vec(), entry.remaining_ttl()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            // Only evict if nobody replaced it since the read above.
            self.map.remove_if(key, |_, entry| entry.is_expired());
            debug!(key = %key, "[DashMap] Evicted expired key");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.map
            .insert(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[DashMap] Cached key with TTL");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        self.map.retain(|key, _| {
            if key.starts_with(prefix) {
                removed.push(key.clone());
                false
            } else {
                true
            }
        });
        debug!(prefix = %prefix, count = removed.len(), "[DashMap] Removed keys by prefix");
        Ok(removed)
    }

    async fn health_check(&self) -> bool {
        let test_key = "health_check_dashmap";
        let test_value = b"health_check_value";

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
        "DashMap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_evicted_on_read() {
        let cache = DashMapCache::new();
        cache
            .set_with_ttl("tenant:a:k", b"v", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(cache.get("tenant:a:k").await, Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cache.contains_raw("tenant:a:k"));
        assert_eq!(cache.get("tenant:a:k").await, None);
        assert!(!cache.contains_raw("tenant:a:k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_with_ttl_reports_time_left() {
        let cache = DashMapCache::new();
        cache
            .set_with_ttl("tenant:a:k", b"v", Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(
            cache.get_with_ttl("tenant:a:k").await,
            Some((b"v".to_vec(), Duration::from_secs(6)))
        );
        assert_eq!(cache.counters(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_remove_prefix_only_touches_prefix() {
        let cache = DashMapCache::new();
        for key in ["tenant:a:x", "tenant:a:y", "tenant:ab:x", "tenant:b:x"] {
            cache.set_with_ttl(key, b"1", Duration::from_secs(60)).await.unwrap();
        }
        let mut removed = cache.remove_prefix("tenant:a:").await.unwrap();
        removed.sort();
        assert_eq!(removed, vec!["tenant:a:x", "tenant:a:y"]);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains_raw("tenant:ab:x"));
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(DashMapCache::new().health_check().await);
    }
}
