//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - Tracing setup
//! - Booking system construction over an in-memory repository
//! - Tenant contexts and record generators
//! - A cache backend that can be switched into failure mode

#![allow(dead_code)]

use anyhow::Result;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tenant_slot_cache::{
    AppointmentRecord, BackoffConfig, BookingConfig, BookingEvent, BookingRequest, BookingSystem,
    CacheBackend, DashMapCache, DebounceConfig, InMemoryRepository, TenantContext, TenantId,
    async_trait,
};
use tokio::sync::broadcast;

static TRACING: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Tenant id unique to one test run
pub fn unique_tenant(name: &str) -> String {
    format!("{}-{}", name, rand::random::<u32>())
}

pub fn ctx(tenant: &str) -> TenantContext {
    TenantContext::new(tenant)
}

pub fn tenant_id(tenant: &str) -> TenantId {
    TenantId::parse(tenant).unwrap_or_else(|| panic!("invalid tenant id {tenant}"))
}

/// Configuration matching the documented scenarios: backoff windows of
/// 1 s, 2 s, 4 s with no immediate retry.
pub fn scenario_config() -> BookingConfig {
    BookingConfig {
        backoff: BackoffConfig {
            immediate_retries: 0,
            ..BackoffConfig::default()
        },
        debounce: DebounceConfig::default(),
        ..BookingConfig::default()
    }
}

/// Booking system over a fresh in-memory repository and DashMap backend.
pub fn setup_system(config: BookingConfig) -> Result<(BookingSystem, Arc<InMemoryRepository>)> {
    init_tracing();
    let repo = Arc::new(InMemoryRepository::new());
    let system = BookingSystem::builder()
        .with_backend(Arc::new(DashMapCache::new()))
        .with_repository(repo.clone())
        .with_config(config)
        .build()?;
    Ok((system, repo))
}

/// Same, on the given backend.
pub fn setup_system_with_backend(
    backend: Arc<dyn CacheBackend>,
    config: BookingConfig,
) -> Result<(BookingSystem, Arc<InMemoryRepository>)> {
    init_tracing();
    let repo = Arc::new(InMemoryRepository::new());
    let system = BookingSystem::builder()
        .with_backend(backend)
        .with_repository(repo.clone())
        .with_config(config)
        .build()?;
    Ok((system, repo))
}

/// Generate booking data
pub mod test_data {
    use super::{AppointmentRecord, BookingRequest};

    pub const DATE: &str = "2024-05-01";
    pub const BARBER: &str = "barber-01";

    pub fn request(time: &str, user: &str) -> BookingRequest {
        BookingRequest {
            date: DATE.to_string(),
            time: time.to_string(),
            barber_id: BARBER.to_string(),
            user_id: Some(user.to_string()),
            client_name: format!("Client {user}"),
            service_name: "Classic cut".to_string(),
            price: 2500,
        }
    }

    pub fn record(id: &str, time: &str, barber: &str) -> AppointmentRecord {
        let mut request = request(time, "u-seed");
        request.barber_id = barber.to_string();
        AppointmentRecord::from_request(id, &request)
    }

    /// One record per hour from 09:00, ids `srv-0`, `srv-1`, ...
    pub fn day(count: usize) -> Vec<AppointmentRecord> {
        (0..count)
            .map(|i| record(&format!("srv-{i}"), &format!("{:02}:00", 9 + i), BARBER))
            .collect()
    }
}

/// Collect every event currently queued on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<BookingEvent>) -> Vec<BookingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[BookingEvent]) -> Vec<&'static str> {
    events.iter().map(BookingEvent::kind).collect()
}

/// DashMap backend whose writes and removals fail while `failing` is set.
#[derive(Default)]
pub struct FlakyBackend {
    inner: DashMapCache,
    failing: AtomicBool,
}

impl FlakyBackend {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("backend unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    async fn get_with_ttl(&self, key: &str) -> Option<(Vec<u8>, Duration)> {
        self.inner.get_with_ttl(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.check()?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.inner.remove(key).await
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.check()?;
        self.inner.remove_prefix(prefix).await
    }

    async fn health_check(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_tenants_are_valid_and_distinct() {
        let a = unique_tenant("bb");
        let b = unique_tenant("bb");
        assert_ne!(a, b, "Tenants should be unique");
        assert!(TenantId::parse(&a).is_some());
    }

    #[test]
    fn test_day_generation() {
        let day = test_data::day(3);
        assert_eq!(day.len(), 3);
        assert_eq!(day[2].time, "11:00");
    }
}
