//! Cache Backend Implementations
//!
//! Raw key/value stores sitting under [`TenantAwareCache`](crate::TenantAwareCache).
//!
//! # Available Backends
//!
//! - **Moka** - Concurrent cache with capacity-bound eviction (default, feature `moka`)
//! - **`DashMap`** - Unbounded concurrent map, handy for tests and small deployments
//!
//! Both store [`CacheEntry`] values and evaluate expiry on read.

#[cfg(feature = "moka")]
pub mod moka_cache;
pub mod dashmap_cache;

#[cfg(feature = "moka")]
pub use moka_cache::{MokaCache, MokaCacheConfig};
pub use dashmap_cache::DashMapCache;

use std::time::Duration;
use tokio::time::Instant;

/// Stored value with the time it was written and its time-to-live.
///
/// Entries are replaced on update, never mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// `now - stored_at > ttl`
    pub fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// Time left before the entry expires.
    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.stored_at.elapsed())
    }
}
