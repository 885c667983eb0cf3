//! Booking System Builder
//!
//! Assembles a [`BookingSystem`] from a repository, an optional custom cache
//! backend and a [`BookingConfig`].
//!
//! # Example: Default Backend
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenant_slot_cache::{BookingSystemBuilder, InMemoryRepository};
//!
//! fn main() -> anyhow::Result<()> {
//!     let system = BookingSystemBuilder::new()
//!         .with_repository(Arc::new(InMemoryRepository::new()))
//!         .build()?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenant_slot_cache::BookingSystemBuilder;
//!
//! let system = BookingSystemBuilder::new()
//!     .with_backend(Arc::new(MyStore::new()))
//!     .with_repository(Arc::new(MyHttpRepository::new()))
//!     .build()?;
//! ```

use crate::appointments::{AppointmentLoader, LoaderSettings};
use crate::availability::AvailabilityChecker;
use crate::backoff::{APPOINTMENTS, BackoffRegistry};
use crate::booking::BookingCoordinator;
use crate::config::BookingConfig;
use crate::debounce::RequestDebouncer;
use crate::events::EventBus;
use crate::tenant_cache::TenantAwareCache;
use crate::traits::{AppointmentRepository, CacheBackend};
use crate::BookingSystem;
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::info;

/// Builder for [`BookingSystem`]
///
/// # Default Behavior
///
/// Without `with_backend`, the cache is Moka (or DashMap when the `moka`
/// feature is off). Without `with_config`, [`BookingConfig::default`] applies.
/// A repository is always required.
#[derive(Default)]
pub struct BookingSystemBuilder {
    backend: Option<Arc<dyn CacheBackend>>,
    repository: Option<Arc<dyn AppointmentRepository>>,
    config: Option<BookingConfig>,
}

impl BookingSystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store cached lists in `backend` instead of the default in-process cache.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Remote source of truth. Required.
    #[must_use]
    pub fn with_repository(mut self, repository: Arc<dyn AppointmentRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: BookingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Wire every component together.
    ///
    /// # Errors
    ///
    /// Returns an error if no repository was configured.
    pub fn build(self) -> Result<BookingSystem> {
        let Some(repository) = self.repository else {
            bail!("BookingSystemBuilder requires a repository (call with_repository)");
        };
        let config = self.config.unwrap_or_default();

        let backend = match self.backend {
            Some(backend) => {
                info!(backend = backend.name(), "Using custom cache backend");
                backend
            }
            None => default_backend(&config),
        };

        let events = EventBus::new(config.events);
        let cache = Arc::new(TenantAwareCache::new(backend, events.clone()));
        let debouncer = Arc::new(RequestDebouncer::new(config.debounce));
        let backoff = Arc::new(BackoffRegistry::new(config.backoff));
        let appointments_backoff = backoff.controller(APPOINTMENTS);

        let loader = Arc::new(AppointmentLoader::new(
            Arc::clone(&cache),
            Arc::clone(&debouncer),
            Arc::clone(&appointments_backoff),
            Arc::clone(&repository),
            events.clone(),
            LoaderSettings {
                list_ttl: config.list_strategy.to_duration(),
                fallback_ttl: config.fallback_strategy.to_duration(),
                remote_timeout: config.remote_timeout,
            },
        ));
        let checker = Arc::new(AvailabilityChecker::new(
            Arc::clone(&cache),
            Arc::clone(&loader),
            config.verify_remotely,
        ));
        let coordinator = Arc::new(BookingCoordinator::new(
            Arc::clone(&cache),
            Arc::clone(&checker),
            repository,
            appointments_backoff,
            events.clone(),
            config.remote_timeout,
        ));

        info!(
            backend = cache.backend_name(),
            verify_remotely = config.verify_remotely,
            remote_timeout_ms = config.remote_timeout.as_millis(),
            "Booking system built"
        );

        Ok(BookingSystem {
            cache,
            debouncer,
            backoff,
            events,
            loader,
            checker,
            coordinator,
            config,
        })
    }
}

#[cfg(feature = "moka")]
fn default_backend(config: &BookingConfig) -> Arc<dyn CacheBackend> {
    Arc::new(crate::backends::MokaCache::new(config.moka))
}

#[cfg(not(feature = "moka"))]
fn default_backend(_config: &BookingConfig) -> Arc<dyn CacheBackend> {
    Arc::new(crate::backends::DashMapCache::new())
}
