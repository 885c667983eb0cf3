//! Appointment Loader - Cached, Debounced, Backoff-Gated Reads
//!
//! Read path for appointment lists:
//!
//! ```text
//! load_appointments(ctx, filter)
//!   ├─ tenant cache hit ───────────────────────────> Fresh
//!   ├─ backoff window open ──> last-known copy ────> Stale | Empty (degraded)
//!   └─ debounced remote fetch
//!        ├─ ok ──> cache list + last-known copy ───> Remote
//!        └─ err ─> last-known copy, else error ────> Stale (degraded) | Err
//! ```
//!
//! Concurrent loads of the same list collapse onto one upstream call through
//! the shared [`RequestDebouncer`].

use crate::backoff::BackoffController;
use crate::debounce::RequestDebouncer;
use crate::error::{BookingError, RepositoryError, Result};
use crate::events::{BookingEvent, EventBus};
use crate::models::{AppointmentFilter, AppointmentRecord};
use crate::tenant::{TenantContext, TenantId, TenantKeyResolver};
use crate::tenant_cache::TenantAwareCache;
use crate::traits::AppointmentRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where a [`LoadOutcome`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Unexpired tenant cache entry
    Fresh,
    /// Fetched from the repository just now
    Remote,
    /// Last-known copy served while the upstream is unavailable
    Stale,
    /// Nothing cached and the upstream is unavailable
    Empty,
}

/// Result of [`AppointmentLoader::load_appointments`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub records: Vec<AppointmentRecord>,
    pub source: LoadSource,
    /// Data may be stale; the upstream could not be consulted.
    pub degraded: bool,
}

impl LoadOutcome {
    fn new(records: Vec<AppointmentRecord>, source: LoadSource) -> Self {
        Self {
            records,
            source,
            degraded: matches!(source, LoadSource::Stale | LoadSource::Empty),
        }
    }
}

/// Logical key of the long-lived copy kept next to a cached list.
pub fn last_known_key(logical: &str) -> String {
    format!("{logical}:last-known")
}

/// TTL and timeout settings of the loader
#[derive(Debug, Clone, Copy)]
pub struct LoaderSettings {
    pub list_ttl: Duration,
    pub fallback_ttl: Duration,
    pub remote_timeout: Duration,
}

/// Cached, debounced, backoff-gated appointment reads
pub struct AppointmentLoader {
    cache: Arc<TenantAwareCache>,
    debouncer: Arc<RequestDebouncer>,
    backoff: Arc<BackoffController>,
    repository: Arc<dyn AppointmentRepository>,
    events: EventBus,
    settings: LoaderSettings,
}

impl AppointmentLoader {
    pub fn new(
        cache: Arc<TenantAwareCache>,
        debouncer: Arc<RequestDebouncer>,
        backoff: Arc<BackoffController>,
        repository: Arc<dyn AppointmentRepository>,
        events: EventBus,
        settings: LoaderSettings,
    ) -> Self {
        Self {
            cache,
            debouncer,
            backoff,
            repository,
            events,
            settings,
        }
    }

    /// Appointments of the context's tenant matching `filter`.
    ///
    /// While the upstream is backing off this never fails: it serves the
    /// last-known copy, or an empty list, flagged as degraded.
    ///
    /// # Errors
    ///
    /// `NoTenantContext` without a tenant. The classified upstream error when
    /// the fetch fails and there is no last-known copy to fall back on.
    pub async fn load_appointments(
        &self,
        ctx: &TenantContext,
        filter: &AppointmentFilter,
    ) -> Result<LoadOutcome> {
        let tenant = ctx.require()?;
        let logical = filter.cache_key();

        if let Some(records) = self.cache.get::<Vec<AppointmentRecord>>(ctx, &logical).await {
            debug!(tenant = %tenant, key = %logical, "Appointments served from cache");
            return Ok(LoadOutcome::new(records, LoadSource::Fresh));
        }

        if self.backoff.should_block() {
            debug!(
                tenant = %tenant,
                key = %logical,
                remaining_ms = self.backoff.remaining().as_millis(),
                "Upstream backing off, serving fallback"
            );
            return Ok(self.fallback(ctx, &logical).await);
        }

        match self.fetch_remote(tenant, filter).await {
            Ok(records) => Ok(LoadOutcome::new(records, LoadSource::Remote)),
            Err(error) => {
                let last_known = self
                    .cache
                    .get::<Vec<AppointmentRecord>>(ctx, &last_known_key(&logical))
                    .await;
                match last_known {
                    Some(records) => {
                        warn!(tenant = %tenant, key = %logical, error = %error, "Fetch failed, serving last-known appointments");
                        Ok(LoadOutcome::new(records, LoadSource::Stale))
                    }
                    None => Err(error),
                }
            }
        }
    }

    /// Remote read bypassing the list cache. Still debounced and backoff-gated;
    /// a successful read refreshes the cache.
    ///
    /// # Errors
    ///
    /// `NoTenantContext`, `UpstreamUnavailable` while backing off, or the
    /// classified fetch error.
    pub async fn fetch_fresh(
        &self,
        ctx: &TenantContext,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AppointmentRecord>> {
        let tenant = ctx.require()?;
        if self.backoff.should_block() {
            return Err(BookingError::UpstreamUnavailable(format!(
                "backing off for another {}ms",
                self.backoff.remaining().as_millis()
            )));
        }
        self.fetch_remote(tenant, filter).await
    }

    async fn fallback(&self, ctx: &TenantContext, logical: &str) -> LoadOutcome {
        match self
            .cache
            .get::<Vec<AppointmentRecord>>(ctx, &last_known_key(logical))
            .await
        {
            Some(records) => LoadOutcome::new(records, LoadSource::Stale),
            None => LoadOutcome::new(Vec::new(), LoadSource::Empty),
        }
    }

    async fn fetch_remote(
        &self,
        tenant: &TenantId,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AppointmentRecord>> {
        let logical = filter.cache_key();
        let key = TenantKeyResolver::key_for(tenant, &format!("fetch:{logical}"));
        let refresh = Refresh {
            cache: Arc::clone(&self.cache),
            backoff: Arc::clone(&self.backoff),
            repository: Arc::clone(&self.repository),
            events: self.events.clone(),
            settings: self.settings,
            tenant: tenant.clone(),
            filter: filter.clone(),
            logical,
        };

        self.debouncer
            .execute_result(key.as_str(), move || refresh.run())
            .await
    }
}

/// One upstream fetch plus the cache writes it triggers
struct Refresh {
    cache: Arc<TenantAwareCache>,
    backoff: Arc<BackoffController>,
    repository: Arc<dyn AppointmentRepository>,
    events: EventBus,
    settings: LoaderSettings,
    tenant: TenantId,
    filter: AppointmentFilter,
    logical: String,
}

impl Refresh {
    async fn run(self) -> Result<Vec<AppointmentRecord>> {
        let timeout = self.settings.remote_timeout;
        let fetched = match tokio::time::timeout(
            timeout,
            self.repository.find_all(&self.tenant, &self.filter),
        )
        .await
        {
            Ok(result) => result.map_err(BookingError::from),
            Err(_) => Err(RepositoryError::Timeout(timeout).into()),
        };

        match fetched {
            Ok(records) => {
                self.backoff.record_success();
                let ctx = TenantContext::from(self.tenant.clone());
                if let Err(e) = self
                    .cache
                    .set(&ctx, &self.logical, &records, self.settings.list_ttl)
                    .await
                {
                    warn!(tenant = %self.tenant, key = %self.logical, error = %e, "Failed to cache appointments");
                }
                if let Err(e) = self
                    .cache
                    .set(&ctx, &last_known_key(&self.logical), &records, self.settings.fallback_ttl)
                    .await
                {
                    warn!(tenant = %self.tenant, key = %self.logical, error = %e, "Failed to store last-known appointments");
                }

                debug!(tenant = %self.tenant, key = %self.logical, count = records.len(), "Fetched appointments");
                self.events.publish(BookingEvent::AppointmentsRefreshed {
                    tenant: self.tenant,
                    key: self.logical,
                    count: records.len(),
                });
                Ok(records)
            }
            Err(error) => {
                if error.is_upstream_failure() {
                    self.backoff.record_failure();
                }
                warn!(tenant = %self.tenant, key = %self.logical, error = %error, "Appointment fetch failed");
                Err(error)
            }
        }
    }
}
