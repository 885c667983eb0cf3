//! In-Memory Repository - Reference `AppointmentRepository`
//!
//! Tenant-partitioned store standing in for the remote service. It is the
//! single source of truth in tests and demos: `create` refuses a second live
//! appointment on the same slot, exactly like the real backend does.
//!
//! Failures and latency can be scripted to exercise backoff and rollback.

use crate::error::RepositoryError;
use crate::models::{AppointmentFilter, AppointmentPatch, AppointmentRecord, BookingRequest};
use crate::tenant::TenantId;
use crate::traits::AppointmentRepository;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Which repository calls a scripted failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    Reads,
    Writes,
    Any,
}

/// Call counters of an [`InMemoryRepository`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryCalls {
    pub find_all: u64,
    pub find_by_id: u64,
    pub create: u64,
    pub update: u64,
    pub delete: u64,
    pub exists: u64,
}

#[derive(Default)]
struct CallCounters {
    find_all: AtomicU64,
    find_by_id: AtomicU64,
    create: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
    exists: AtomicU64,
}

/// In-memory appointment store partitioned by tenant
#[derive(Default)]
pub struct InMemoryRepository {
    tenants: DashMap<TenantId, Vec<AppointmentRecord>>,
    failures: Mutex<VecDeque<(FailureScope, RepositoryError)>>,
    latency: Mutex<Duration>,
    calls: CallCounters,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records for a tenant, bypassing conflict checks.
    pub fn seed(&self, tenant: &TenantId, records: impl IntoIterator<Item = AppointmentRecord>) {
        self.tenants.entry(tenant.clone()).or_default().extend(records);
    }

    /// Fail the next matching call with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, scope: FailureScope, error: RepositoryError) {
        self.failures.lock().push_back((scope, error));
    }

    /// Fail the next `times` matching calls with `error`.
    pub fn fail_times(&self, scope: FailureScope, error: RepositoryError, times: usize) {
        let mut failures = self.failures.lock();
        failures.extend(std::iter::repeat_n((scope, error), times));
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Everything stored for a tenant, cancelled and removed records included.
    pub fn records(&self, tenant: &TenantId) -> Vec<AppointmentRecord> {
        self.tenants
            .get(tenant)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> RepositoryCalls {
        RepositoryCalls {
            find_all: self.calls.find_all.load(Ordering::Relaxed),
            find_by_id: self.calls.find_by_id.load(Ordering::Relaxed),
            create: self.calls.create.load(Ordering::Relaxed),
            update: self.calls.update.load(Ordering::Relaxed),
            delete: self.calls.delete.load(Ordering::Relaxed),
            exists: self.calls.exists.load(Ordering::Relaxed),
        }
    }

    async fn enter(&self, counter: &AtomicU64, write: bool) -> Result<(), RepositoryError> {
        counter.fetch_add(1, Ordering::Relaxed);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.lock();
        let position = failures.iter().position(|(scope, _)| match scope {
            FailureScope::Any => true,
            FailureScope::Reads => !write,
            FailureScope::Writes => write,
        });
        match position.and_then(|index| failures.remove(index)) {
            Some((_, error)) => {
                debug!(error = %error, "Scripted repository failure");
                Err(error)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryRepository {
    async fn find_all(
        &self,
        tenant: &TenantId,
        filter: &AppointmentFilter,
    ) -> Result<Vec<AppointmentRecord>, RepositoryError> {
        self.enter(&self.calls.find_all, false).await?;
        Ok(self
            .records(tenant)
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    async fn find_by_id(
        &self,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Option<AppointmentRecord>, RepositoryError> {
        self.enter(&self.calls.find_by_id, false).await?;
        Ok(self.records(tenant).into_iter().find(|record| record.id == id))
    }

    async fn create(
        &self,
        tenant: &TenantId,
        request: &BookingRequest,
    ) -> Result<AppointmentRecord, RepositoryError> {
        self.enter(&self.calls.create, true).await?;

        let slot = request.slot();
        let mut records = self.tenants.entry(tenant.clone()).or_default();
        if let Some(existing) = slot.find_conflict(&records) {
            return Err(RepositoryError::Conflict(format!(
                "{} {} with {} is held by {}",
                slot.date, slot.time, slot.barber_id, existing.id
            )));
        }

        let record = AppointmentRecord::from_request(Uuid::new_v4().to_string(), request);
        records.push(record.clone());
        debug!(tenant = %tenant, id = %record.id, "Created appointment");
        Ok(record)
    }

    async fn update(
        &self,
        tenant: &TenantId,
        id: &str,
        patch: &AppointmentPatch,
    ) -> Result<AppointmentRecord, RepositoryError> {
        self.enter(&self.calls.update, true).await?;

        let mut records = self
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let index = records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        let mut updated = records
            .get(index)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        patch.apply(&mut updated);

        // Moving onto another slot must not collide with a live booking there.
        if updated.is_live() {
            let slot = updated.slot();
            let clash = records
                .iter()
                .enumerate()
                .any(|(i, other)| i != index && slot.occupied_by(other));
            if clash {
                return Err(RepositoryError::Conflict(format!(
                    "{} {} with {} is already booked",
                    slot.date, slot.time, slot.barber_id
                )));
            }
        }

        if let Some(stored) = records.get_mut(index) {
            *stored = updated.clone();
        }
        Ok(updated)
    }

    async fn delete(&self, tenant: &TenantId, id: &str) -> Result<(), RepositoryError> {
        self.enter(&self.calls.delete, true).await?;

        let mut records = self
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn exists(&self, tenant: &TenantId, id: &str) -> Result<bool, RepositoryError> {
        self.enter(&self.calls.exists, false).await?;
        Ok(self.records(tenant).iter().any(|record| record.id == id))
    }
}
