//! Tenant-Aware Cache
//!
//! TTL key/value cache over any [`CacheBackend`], where every key is resolved
//! through [`TenantKeyResolver`]. Callers only ever deal in logical keys.

use crate::codecs::JsonCodec;
use crate::error::{BookingError, Result};
use crate::events::{BookingEvent, EventBus};
use crate::tenant::{TENANT_KEY_PREFIX, TenantContext, TenantKeyResolver};
use crate::traits::{CacheBackend, CacheCodec};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// TTL policies for different kinds of data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Real-time data - 10 seconds TTL
    RealTime,
    /// Short-term data - 5 minutes TTL
    ShortTerm,
    /// Medium-term data - 1 hour TTL
    MediumTerm,
    /// Long-term data - 3 hours TTL
    LongTerm,
    /// Custom TTL
    Custom(Duration),
    /// Default strategy (5 minutes)
    Default,
}

impl CacheStrategy {
    /// Convert strategy to duration
    pub fn to_duration(&self) -> Duration {
        match self {
            Self::RealTime => Duration::from_secs(10),
            Self::ShortTerm | Self::Default => Duration::from_secs(300),
            Self::MediumTerm => Duration::from_secs(3600),
            Self::LongTerm => Duration::from_secs(10800),
            Self::Custom(duration) => *duration,
        }
    }
}

/// Tenant cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub removes: u64,
    pub tenant_clears: u64,
    /// Reads attempted without a resolvable tenant
    pub rejected_no_tenant: u64,
    pub backend_errors: u64,
}

/// Cache that namespaces every key by tenant
pub struct TenantAwareCache {
    backend: Arc<dyn CacheBackend>,
    codec: JsonCodec,
    events: EventBus,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    removes: AtomicU64,
    tenant_clears: AtomicU64,
    rejected_no_tenant: AtomicU64,
    backend_errors: AtomicU64,
}

impl TenantAwareCache {
    pub fn new(backend: Arc<dyn CacheBackend>, events: EventBus) -> Self {
        info!(backend = backend.name(), "Initializing tenant-aware cache");
        Self {
            backend,
            codec: JsonCodec,
            events,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            tenant_clears: AtomicU64::new(0),
            rejected_no_tenant: AtomicU64::new(0),
            backend_errors: AtomicU64::new(0),
        }
    }

    /// Read a value for the context's tenant.
    ///
    /// Returns `None` on miss, on expiry, when there is no tenant, or when the
    /// stored bytes no longer decode to `T` (the entry is then dropped).
    pub async fn get<T: DeserializeOwned>(&self, ctx: &TenantContext, logical: &str) -> Option<T> {
        self.get_with_ttl(ctx, logical).await.map(|(value, _)| value)
    }

    /// [`get`](Self::get) plus the time left before the entry expires.
    ///
    /// Writing a modified value back with that remaining TTL keeps the
    /// original expiry.
    pub async fn get_with_ttl<T: DeserializeOwned>(
        &self,
        ctx: &TenantContext,
        logical: &str,
    ) -> Option<(T, Duration)> {
        let Ok(key) = TenantKeyResolver::key(ctx, logical) else {
            self.rejected_no_tenant.fetch_add(1, Ordering::Relaxed);
            debug!(logical = %logical, "Cache read without tenant context treated as miss");
            return None;
        };

        let Some((bytes, remaining)) = self.backend.get_with_ttl(key.as_str()).await else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        match self.codec.deserialize::<T>(&bytes) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some((value, remaining))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping undecodable cache entry");
                let _ = self.backend.remove(key.as_str()).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value for the context's tenant, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// `NoTenantContext` when the context has no tenant (nothing is written);
    /// `Cache` when encoding or the backend fails. Backend failures are safe to
    /// log and ignore, since the data also lives upstream.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        ctx: &TenantContext,
        logical: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let key = TenantKeyResolver::key(ctx, logical)?;
        let bytes = self
            .codec
            .serialize(value)
            .map_err(|e| BookingError::Cache(e.to_string()))?;

        if let Err(e) = self.backend.set_with_ttl(key.as_str(), &bytes, ttl).await {
            self.backend_errors.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, error = %e, "Cache write failed");
            return Err(BookingError::Cache(e.to_string()));
        }
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// [`set`](Self::set) with a [`CacheStrategy`] TTL.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn set_with_strategy<T: Serialize + ?Sized>(
        &self,
        ctx: &TenantContext,
        logical: &str,
        value: &T,
        strategy: CacheStrategy,
    ) -> Result<()> {
        self.set(ctx, logical, value, strategy.to_duration()).await
    }

    /// Remove one logical key of the context's tenant.
    ///
    /// # Errors
    ///
    /// `NoTenantContext` or `Cache` on backend failure.
    pub async fn remove(&self, ctx: &TenantContext, logical: &str) -> Result<()> {
        let key = TenantKeyResolver::key(ctx, logical)?;
        self.backend.remove(key.as_str()).await.map_err(|e| {
            self.backend_errors.fetch_add(1, Ordering::Relaxed);
            BookingError::Cache(e.to_string())
        })?;
        self.removes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Drop every entry of the context's tenant and broadcast `cacheInvalidated`.
    ///
    /// Returns the removed logical keys.
    ///
    /// # Errors
    ///
    /// `NoTenantContext` or `Cache` on backend failure.
    pub async fn clear_tenant_cache(&self, ctx: &TenantContext) -> Result<Vec<String>> {
        let tenant = ctx.require()?;
        let prefix = TenantKeyResolver::tenant_prefix(tenant);
        let removed = self.backend.remove_prefix(&prefix).await.map_err(|e| {
            self.backend_errors.fetch_add(1, Ordering::Relaxed);
            BookingError::Cache(e.to_string())
        })?;

        let keys: Vec<String> = removed
            .iter()
            .filter_map(|raw| TenantKeyResolver::logical_part(tenant, raw))
            .map(str::to_string)
            .collect();

        self.tenant_clears.fetch_add(1, Ordering::Relaxed);
        info!(tenant = %tenant, count = keys.len(), "Cleared tenant cache");
        self.events
            .publish(BookingEvent::cache_invalidated(tenant.clone(), keys.clone()));
        Ok(keys)
    }

    /// Drop every tenant's entries. Lifecycle reset, no events.
    ///
    /// # Errors
    ///
    /// `Cache` on backend failure.
    pub async fn clear_all(&self) -> Result<usize> {
        let removed = self
            .backend
            .remove_prefix(TENANT_KEY_PREFIX)
            .await
            .map_err(|e| BookingError::Cache(e.to_string()))?;
        Ok(removed.len())
    }

    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn stats(&self) -> TenantCacheStats {
        TenantCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            tenant_clears: self.tenant_clears.load(Ordering::Relaxed),
            rejected_no_tenant: self.rejected_no_tenant.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
        }
    }
}
