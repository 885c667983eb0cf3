//! Tenant Slot Cache
//!
//! Tenant-scoped caching and optimistic booking coordination for
//! multi-storefront scheduling clients:
//! - **Tenant isolation**: every cache key is `tenant:{id}:{logical}`, built in one place
//! - **Request coalescing**: concurrent identical reads share one upstream call
//! - **Upstream backoff**: exponential windows while the remote keeps failing,
//!   with last-known data served instead of errors
//! - **Multi-tier availability**: local view, barber/user/global caches, then remote
//! - **Optimistic booking**: tentative hold, remote commit, reconcile or roll back
//! - **Event bus**: `slotBlocked`, `slotUnblocked`, `bookingConfirmed`, `cacheInvalidated`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenant_slot_cache::{
//!     AppointmentFilter, BookingRequest, BookingSystem, InMemoryRepository, TenantContext,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let system = BookingSystem::builder()
//!         .with_repository(Arc::new(InMemoryRepository::new()))
//!         .build()?;
//!
//!     let ctx = TenantContext::new("bb-alpha");
//!     let outcome = system.load_appointments(&ctx, &AppointmentFilter::barber("barber-01")).await?;
//!     tracing::info!(count = outcome.records.len(), degraded = outcome.degraded, "Loaded");
//!
//!     let request = BookingRequest {
//!         date: "2024-05-01".into(),
//!         time: "10:00".into(),
//!         barber_id: "barber-01".into(),
//!         user_id: Some("u-1".into()),
//!         client_name: "Ana".into(),
//!         service_name: "Fade".into(),
//!         price: 2500,
//!     };
//!     match system.create_appointment(&ctx, &request, None).await {
//!         Ok(record) => tracing::info!(id = %record.id, "Booked"),
//!         Err(e) => tracing::warn!("{e}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! load ──> TenantAwareCache ──miss──> RequestDebouncer ──> BackoffController ──> Repository
//!                 ▲                                                                  │
//!                 └──────────────── list + last-known copy <─────────────────────────┘
//!
//! book ──> AvailabilityChecker ──free──> BookingCoordinator ──> EventBus
//! ```

use std::sync::Arc;
use tracing::{info, warn};

pub mod appointments;
pub mod availability;
pub mod backends;
pub mod backoff;
pub mod booking;
pub mod builder;
pub mod codecs;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod models;
pub mod repository;
pub mod tenant;
pub mod tenant_cache;
pub mod traits;

pub use appointments::{AppointmentLoader, LoadOutcome, LoadSource};
pub use availability::{AvailabilityChecker, Tier, Verdict};
#[cfg(feature = "moka")]
pub use backends::{MokaCache, MokaCacheConfig};
pub use backends::DashMapCache;
pub use backoff::{APPOINTMENTS, BackoffConfig, BackoffController, BackoffRegistry, BackoffState};
pub use booking::{AppointmentView, BookingCoordinator, BookingStats};
pub use builder::BookingSystemBuilder;
pub use codecs::JsonCodec;
pub use config::BookingConfig;
pub use debounce::{DebounceConfig, DebouncerStats, RequestDebouncer};
pub use error::{BookingError, RepositoryError, Result};
pub use events::{BookingEvent, EventBus, EventBusConfig, EventBusStats, TenantSubscription};
pub use models::{AppointmentFilter, AppointmentPatch, AppointmentRecord, BookingRequest, Slot};
pub use repository::{FailureScope, InMemoryRepository, RepositoryCalls};
pub use tenant::{CacheKey, TenantContext, TenantId, TenantKeyResolver};
pub use tenant_cache::{CacheStrategy, TenantAwareCache, TenantCacheStats};
pub use traits::{AppointmentRepository, CacheBackend, CacheCodec};

// Re-export async_trait for implementors of the traits above
pub use async_trait::async_trait;

/// Counters of every component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemStats {
    pub cache: TenantCacheStats,
    pub debouncer: DebouncerStats,
    pub events: EventBusStats,
    pub booking: BookingStats,
}

/// Main entry point: one explicitly constructed instance per process (or per
/// test), shared by cloning.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tenant_slot_cache::{BookingSystem, InMemoryRepository, TenantContext};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let system = BookingSystem::builder()
///         .with_repository(Arc::new(InMemoryRepository::new()))
///         .build()?;
///
///     let mut events = system.subscribe_tenant(&TenantContext::new("bb-alpha"))?;
///     while let Some(event) = events.recv().await {
///         println!("{}", event.to_json()?);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct BookingSystem {
    pub(crate) cache: Arc<TenantAwareCache>,
    pub(crate) debouncer: Arc<RequestDebouncer>,
    pub(crate) backoff: Arc<BackoffRegistry>,
    pub(crate) events: EventBus,
    pub(crate) loader: Arc<AppointmentLoader>,
    pub(crate) checker: Arc<AvailabilityChecker>,
    pub(crate) coordinator: Arc<BookingCoordinator>,
    pub(crate) config: BookingConfig,
}

impl BookingSystem {
    pub fn builder() -> BookingSystemBuilder {
        BookingSystemBuilder::new()
    }

    /// See [`AppointmentLoader::load_appointments`].
    ///
    /// # Errors
    ///
    /// `NoTenantContext`, or an upstream error when nothing cached can be served.
    pub async fn load_appointments(
        &self,
        ctx: &TenantContext,
        filter: &AppointmentFilter,
    ) -> Result<LoadOutcome> {
        self.loader.load_appointments(ctx, filter).await
    }

    /// Synchronous check against what the caller already holds.
    pub fn is_available(&self, slot: &Slot, local: &[AppointmentRecord]) -> bool {
        AvailabilityChecker::is_available(slot, local)
    }

    /// Every tier, reporting where a conflict was found.
    ///
    /// # Errors
    ///
    /// `NoTenantContext`.
    pub async fn check_availability(
        &self,
        ctx: &TenantContext,
        slot: &Slot,
        user_id: Option<&str>,
        local: &[AppointmentRecord],
    ) -> Result<Verdict> {
        self.checker.check(ctx, slot, user_id, local).await
    }

    /// # Errors
    ///
    /// `NoTenantContext`.
    pub async fn is_available_authoritative(
        &self,
        ctx: &TenantContext,
        slot: &Slot,
        user_id: Option<&str>,
        local: &[AppointmentRecord],
    ) -> Result<bool> {
        self.checker.is_available_authoritative(ctx, slot, user_id, local).await
    }

    /// See [`BookingCoordinator::create_appointment`].
    ///
    /// # Errors
    ///
    /// `NoTenantContext`, `SlotConflict`, `UpstreamUnavailable`,
    /// `StaleWriteRejected` or `Unknown`.
    pub async fn create_appointment(
        &self,
        ctx: &TenantContext,
        request: &BookingRequest,
        view: Option<&AppointmentView>,
    ) -> Result<AppointmentRecord> {
        self.coordinator.create_appointment(ctx, request, view).await
    }

    /// See [`BookingCoordinator::cancel_appointment`].
    ///
    /// # Errors
    ///
    /// `NoTenantContext` or the classified repository error.
    pub async fn cancel_appointment(
        &self,
        ctx: &TenantContext,
        id: &str,
        view: Option<&AppointmentView>,
    ) -> Result<AppointmentRecord> {
        self.coordinator.cancel_appointment(ctx, id, view).await
    }

    /// Drop every cached entry of the context's tenant.
    ///
    /// # Errors
    ///
    /// `NoTenantContext` or `Cache`.
    pub async fn clear_tenant_cache(&self, ctx: &TenantContext) -> Result<Vec<String>> {
        self.cache.clear_tenant_cache(ctx).await
    }

    /// Events of every tenant.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BookingEvent> {
        self.events.subscribe()
    }

    /// Events of the context's tenant only.
    ///
    /// # Errors
    ///
    /// `NoTenantContext`.
    pub fn subscribe_tenant(&self, ctx: &TenantContext) -> Result<TenantSubscription> {
        Ok(self.events.subscribe_tenant(ctx.require()?.clone()))
    }

    pub async fn health_check(&self) -> bool {
        let healthy = self.cache.health_check().await;
        if healthy {
            info!(backend = self.cache.backend_name(), "Booking system health check passed");
        } else {
            warn!(backend = self.cache.backend_name(), "Booking system cache backend unhealthy");
        }
        healthy
    }

    /// Return to a freshly built state: empty cache, no pending operations,
    /// no backoff. Subscribers stay connected.
    ///
    /// # Errors
    ///
    /// `Cache` if the backend cannot be cleared.
    pub async fn reset(&self) -> Result<()> {
        let removed = self.cache.clear_all().await?;
        self.debouncer.clear();
        self.backoff.reset();
        info!(removed, "Booking system reset");
        Ok(())
    }

    pub fn cache(&self) -> &Arc<TenantAwareCache> {
        &self.cache
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn debouncer(&self) -> &Arc<RequestDebouncer> {
        &self.debouncer
    }

    /// Backoff controller of a resource class, e.g. [`APPOINTMENTS`].
    pub fn backoff(&self, class: &str) -> Arc<BackoffController> {
        self.backoff.controller(class)
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub fn stats(&self) -> SystemStats {
        SystemStats {
            cache: self.cache.stats(),
            debouncer: self.debouncer.stats(),
            events: self.events.stats(),
            booking: self.coordinator.stats(),
        }
    }
}
