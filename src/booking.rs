//! Booking Coordinator - Optimistic Create, Confirm, Rollback
//!
//! ```text
//! CHECKING ──conflict──> SlotConflict (nothing touched)
//!    │
//! LOCAL_COMMIT   temp record into view + cached barber/global/user lists, slotBlocked
//!    │
//! REMOTE_COMMIT  repository.create under timeout
//!    ├── ok ──> CONFIRMED     temp id swapped for server id, bookingConfirmed
//!    └── err ─> ROLLED_BACK   temp record removed everywhere, slotUnblocked
//! ```
//!
//! There is no lock across clients. The repository's create is the single
//! arbiter; a rollback restores every touched list to its prior content.
//!
//! Holds only go into lists that are already cached. An uncached list is
//! fetched in full on its next load, so it must not be seeded with a single
//! record. Every rewrite keeps the entry's remaining TTL.

use crate::availability::{AvailabilityChecker, Verdict};
use crate::backoff::BackoffController;
use crate::error::{BookingError, RepositoryError, Result};
use crate::events::{BookingEvent, EventBus};
use crate::models::{
    AppointmentFilter, AppointmentPatch, AppointmentRecord, BookingRequest, Slot, TENTATIVE_ID_PREFIX,
};
use crate::tenant::{TenantContext, TenantId};
use crate::tenant_cache::TenantAwareCache;
use crate::traits::AppointmentRepository;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// In-memory list of appointments owned by one caller (a calendar view, a
/// form). Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct AppointmentView {
    records: Arc<RwLock<Vec<AppointmentRecord>>>,
}

impl AppointmentView {
    pub fn new(records: Vec<AppointmentRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub fn snapshot(&self) -> Vec<AppointmentRecord> {
        self.records.read().clone()
    }

    pub fn replace_all(&self, records: Vec<AppointmentRecord>) {
        *self.records.write() = records;
    }

    pub fn insert(&self, record: AppointmentRecord) {
        self.records.write().push(record);
    }

    /// Replace the record `id` with `record`, appending it when `id` is gone.
    pub fn swap_id(&self, id: &str, record: AppointmentRecord) {
        let mut records = self.records.write();
        upsert(&mut records, id, record);
    }

    pub fn remove_id(&self, id: &str) -> Option<AppointmentRecord> {
        let mut records = self.records.write();
        let index = records.iter().position(|record| record.id == id)?;
        Some(records.remove(index))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.read().iter().any(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn upsert(records: &mut Vec<AppointmentRecord>, id: &str, record: AppointmentRecord) {
    if let Some(existing) = records.iter_mut().find(|existing| existing.id == id) {
        *existing = record;
    } else if !records.iter().any(|existing| existing.id == record.id) {
        records.push(record);
    }
}

/// Coordinator counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingStats {
    pub attempts: u64,
    pub confirmed: u64,
    pub rolled_back: u64,
    pub rejected_at_check: u64,
    pub cancelled: u64,
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    confirmed: AtomicU64,
    rolled_back: AtomicU64,
    rejected_at_check: AtomicU64,
    cancelled: AtomicU64,
}

/// Optimistic create / confirm / rollback of appointments
pub struct BookingCoordinator {
    cache: Arc<TenantAwareCache>,
    checker: Arc<AvailabilityChecker>,
    repository: Arc<dyn AppointmentRepository>,
    backoff: Arc<BackoffController>,
    events: EventBus,
    remote_timeout: Duration,
    next_tentative: AtomicU64,
    counters: Counters,
}

impl BookingCoordinator {
    pub fn new(
        cache: Arc<TenantAwareCache>,
        checker: Arc<AvailabilityChecker>,
        repository: Arc<dyn AppointmentRepository>,
        backoff: Arc<BackoffController>,
        events: EventBus,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            checker,
            repository,
            backoff,
            events,
            remote_timeout,
            next_tentative: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    /// Book `request`, showing it as held immediately and confirming it with
    /// the repository afterwards.
    ///
    /// `view` is the caller's in-memory list: it is used as the local
    /// availability tier and receives the tentative record.
    ///
    /// # Errors
    ///
    /// - `NoTenantContext` before anything is touched
    /// - `SlotConflict` when a tier or the repository finds the slot taken
    /// - `UpstreamUnavailable` while backing off, or when the create fails
    ///   for network reasons (after rollback)
    /// - `StaleWriteRejected` / `Unknown` for other create failures (after rollback)
    pub async fn create_appointment(
        &self,
        ctx: &TenantContext,
        request: &BookingRequest,
        view: Option<&AppointmentView>,
    ) -> Result<AppointmentRecord> {
        let tenant = ctx.require()?;
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);
        let slot = request.slot();

        // CHECKING
        let local = view.map(AppointmentView::snapshot).unwrap_or_default();
        let verdict = self
            .checker
            .check(ctx, &slot, request.user_id.as_deref(), &local)
            .await?;
        if let Verdict::Conflict(tier) = verdict {
            self.counters.rejected_at_check.fetch_add(1, Ordering::Relaxed);
            info!(tenant = %tenant, tier = %tier, date = %slot.date, time = %slot.time, "Booking rejected, slot taken");
            return Err(conflict(&slot));
        }
        if self.backoff.should_block() {
            return Err(BookingError::UpstreamUnavailable(format!(
                "backing off for another {}ms",
                self.backoff.remaining().as_millis()
            )));
        }

        // LOCAL_COMMIT
        let tentative_id = format!(
            "{TENTATIVE_ID_PREFIX}{}",
            self.next_tentative.fetch_add(1, Ordering::Relaxed)
        );
        let tentative = AppointmentRecord::from_request(tentative_id.clone(), request);
        if let Some(view) = view {
            view.insert(tentative.clone());
        }
        self.events.publish(BookingEvent::SlotBlocked {
            tenant: tenant.clone(),
            date: slot.date.clone(),
            time: slot.time.clone(),
            barber_id: slot.barber_id.clone(),
            tentative_id: tentative_id.clone(),
        });
        let touched = self.write_tentative(ctx, &tentative).await;
        debug!(tenant = %tenant, tentative = %tentative_id, lists = touched.len(), "Tentative booking placed");

        // REMOTE_COMMIT
        match self.remote_create(tenant, request).await {
            Ok(confirmed) => {
                self.backoff.record_success();
                self.reconcile(ctx, &tentative_id, &confirmed, &touched, view).await;
                self.counters.confirmed.fetch_add(1, Ordering::Relaxed);
                info!(tenant = %tenant, tentative = %tentative_id, id = %confirmed.id, "Booking confirmed");
                self.events.publish(BookingEvent::BookingConfirmed {
                    tenant: tenant.clone(),
                    tentative_id,
                    record: confirmed.clone(),
                });
                Ok(confirmed)
            }
            Err(failure) => {
                let error = match failure {
                    RepositoryError::Conflict(_) => conflict(&slot),
                    other => BookingError::from(other),
                };
                if error.is_upstream_failure() {
                    self.backoff.record_failure();
                }
                warn!(tenant = %tenant, tentative = %tentative_id, error = %error, "Remote create failed, rolling back");
                self.rollback(ctx, tenant, &tentative_id, &slot, &touched, view).await;
                self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                Err(error)
            }
        }
    }

    /// Cancel appointment `id` upstream, then drop it from `view` and the
    /// tenant cache and announce the freed slot.
    ///
    /// # Errors
    ///
    /// `NoTenantContext`, or the classified repository error.
    pub async fn cancel_appointment(
        &self,
        ctx: &TenantContext,
        id: &str,
        view: Option<&AppointmentView>,
    ) -> Result<AppointmentRecord> {
        let tenant = ctx.require()?;
        let patch = AppointmentPatch::cancel();
        let cancelled = match tokio::time::timeout(
            self.remote_timeout,
            self.repository.update(tenant, id, &patch),
        )
        .await
        {
            Ok(result) => result.map_err(BookingError::from),
            Err(_) => Err(RepositoryError::Timeout(self.remote_timeout).into()),
        };
        let cancelled = match cancelled {
            Ok(record) => {
                self.backoff.record_success();
                record
            }
            Err(error) => {
                if error.is_upstream_failure() {
                    self.backoff.record_failure();
                }
                return Err(error);
            }
        };

        if let Some(view) = view {
            view.remove_id(id);
        }
        if let Err(e) = self.cache.clear_tenant_cache(ctx).await {
            warn!(tenant = %tenant, error = %e, "Failed to clear cache after cancellation");
        }
        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        info!(tenant = %tenant, id = %id, "Appointment cancelled");
        self.events.publish(BookingEvent::SlotUnblocked {
            tenant: tenant.clone(),
            date: cancelled.date.clone(),
            time: cancelled.time.clone(),
            barber_id: cancelled.barber_id.clone(),
        });
        Ok(cancelled)
    }

    pub fn stats(&self) -> BookingStats {
        BookingStats {
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            confirmed: self.counters.confirmed.load(Ordering::Relaxed),
            rolled_back: self.counters.rolled_back.load(Ordering::Relaxed),
            rejected_at_check: self.counters.rejected_at_check.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
        }
    }

    async fn remote_create(
        &self,
        tenant: &TenantId,
        request: &BookingRequest,
    ) -> std::result::Result<AppointmentRecord, RepositoryError> {
        tokio::time::timeout(self.remote_timeout, self.repository.create(tenant, request))
            .await
            .unwrap_or(Err(RepositoryError::Timeout(self.remote_timeout)))
    }

    /// Lists holding a tentative copy of `record`.
    fn target_lists(record: &AppointmentRecord) -> Vec<String> {
        let mut lists = vec![
            AppointmentFilter::barber(&record.barber_id).cache_key(),
            AppointmentFilter::all().cache_key(),
        ];
        if let Some(user_id) = &record.user_id {
            lists.push(AppointmentFilter::user(user_id).cache_key());
        }
        lists
    }

    /// Add `record` to every cached target list, returning the lists written.
    async fn write_tentative(&self, ctx: &TenantContext, record: &AppointmentRecord) -> Vec<String> {
        let mut touched = Vec::new();
        for logical in Self::target_lists(record) {
            let Some((mut records, remaining)) =
                self.cache.get_with_ttl::<Vec<AppointmentRecord>>(ctx, &logical).await
            else {
                debug!(key = %logical, "List not cached, no hold written");
                continue;
            };
            records.push(record.clone());

            match self.cache.set(ctx, &logical, &records, remaining).await {
                Ok(()) => touched.push(logical),
                Err(e) => warn!(key = %logical, error = %e, "Failed to write tentative booking to cache"),
            }
        }
        touched
    }

    async fn reconcile(
        &self,
        ctx: &TenantContext,
        tentative_id: &str,
        confirmed: &AppointmentRecord,
        touched: &[String],
        view: Option<&AppointmentView>,
    ) {
        if let Some(view) = view {
            view.swap_id(tentative_id, confirmed.clone());
        }

        for logical in touched {
            // A list cleared or expired meanwhile is refetched on the next load.
            let Some((mut records, remaining)) =
                self.cache.get_with_ttl::<Vec<AppointmentRecord>>(ctx, logical).await
            else {
                continue;
            };
            upsert(&mut records, tentative_id, confirmed.clone());
            if let Err(e) = self.cache.set(ctx, logical, &records, remaining).await {
                warn!(key = %logical, error = %e, "Failed to reconcile cached booking");
            }
        }
    }

    /// Remove the tentative record everywhere it was written. Cleanup errors
    /// are logged; `slotUnblocked` is published regardless.
    async fn rollback(
        &self,
        ctx: &TenantContext,
        tenant: &TenantId,
        tentative_id: &str,
        slot: &Slot,
        touched: &[String],
        view: Option<&AppointmentView>,
    ) {
        if let Some(view) = view {
            view.remove_id(tentative_id);
        }

        for logical in touched {
            let Some((mut records, remaining)) =
                self.cache.get_with_ttl::<Vec<AppointmentRecord>>(ctx, logical).await
            else {
                continue;
            };
            records.retain(|record| record.id != tentative_id);
            if let Err(e) = self.cache.set(ctx, logical, &records, remaining).await {
                warn!(key = %logical, error = %e, "Rollback cache cleanup failed");
            }
        }

        self.events.publish(BookingEvent::SlotUnblocked {
            tenant: tenant.clone(),
            date: slot.date.clone(),
            time: slot.time.clone(),
            barber_id: slot.barber_id.clone(),
        });
    }
}

fn conflict(slot: &Slot) -> BookingError {
    BookingError::slot_conflict(&slot.date, &slot.time, &slot.barber_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::{AppointmentLoader, LoaderSettings};
    use crate::backends::DashMapCache;
    use crate::backoff::{APPOINTMENTS, BackoffConfig};
    use crate::debounce::RequestDebouncer;
    use crate::repository::{FailureScope, InMemoryRepository};
    use tokio::sync::broadcast;

    struct Fixture {
        coordinator: Arc<BookingCoordinator>,
        cache: Arc<TenantAwareCache>,
        repo: Arc<InMemoryRepository>,
        bus: EventBus,
        backoff: Arc<BackoffController>,
    }

    fn fixture(verify_remotely: bool) -> Fixture {
        let bus = EventBus::default();
        let cache = Arc::new(TenantAwareCache::new(Arc::new(DashMapCache::new()), bus.clone()));
        let repo = Arc::new(InMemoryRepository::new());
        let backoff = Arc::new(BackoffController::new(APPOINTMENTS, BackoffConfig::default()));
        let loader = Arc::new(AppointmentLoader::new(
            Arc::clone(&cache),
            Arc::new(RequestDebouncer::default()),
            Arc::clone(&backoff),
            repo.clone(),
            bus.clone(),
            LoaderSettings {
                list_ttl: Duration::from_secs(300),
                fallback_ttl: Duration::from_secs(10800),
                remote_timeout: Duration::from_secs(10),
            },
        ));
        let checker = Arc::new(AvailabilityChecker::new(Arc::clone(&cache), loader, verify_remotely));
        let coordinator = Arc::new(BookingCoordinator::new(
            Arc::clone(&cache),
            checker,
            repo.clone(),
            Arc::clone(&backoff),
            bus.clone(),
            Duration::from_secs(10),
        ));
        Fixture {
            coordinator,
            cache,
            repo,
            bus,
            backoff,
        }
    }

    fn request(time: &str, user: &str) -> BookingRequest {
        BookingRequest {
            date: "2024-05-01".into(),
            time: time.into(),
            barber_id: "barber-01".into(),
            user_id: Some(user.into()),
            client_name: "Ana".into(),
            service_name: "Fade".into(),
            price: 2500,
        }
    }

    fn kinds(rx: &mut broadcast::Receiver<BookingEvent>) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        kinds
    }

    async fn cached(f: &Fixture, ctx: &TenantContext, logical: &str) -> Option<Vec<AppointmentRecord>> {
        f.cache.get::<Vec<AppointmentRecord>>(ctx, logical).await
    }

    #[tokio::test]
    async fn test_confirmed_booking_replaces_tentative_id_everywhere() {
        let f = fixture(false);
        let ctx = TenantContext::new("bb-alpha");
        let mut rx = f.bus.subscribe();
        let view = AppointmentView::default();
        f.cache
            .set(&ctx, "appointments:barberId=barber-01", &Vec::<AppointmentRecord>::new(), Duration::from_secs(300))
            .await
            .unwrap();

        let confirmed = f
            .coordinator
            .create_appointment(&ctx, &request("10:00", "u-1"), Some(&view))
            .await
            .unwrap();

        assert!(!confirmed.is_tentative());
        assert_eq!(view.snapshot(), vec![confirmed.clone()]);
        assert_eq!(
            cached(&f, &ctx, "appointments:barberId=barber-01").await,
            Some(vec![confirmed.clone()])
        );
        // Lists that were not cached stay uncached and get fetched in full.
        assert_eq!(cached(&f, &ctx, "appointments:all").await, None);
        assert_eq!(cached(&f, &ctx, "appointments:userId=u-1").await, None);
        assert_eq!(kinds(&mut rx), vec!["slotBlocked", "bookingConfirmed"]);
        assert_eq!(f.coordinator.stats().confirmed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_keeps_list_expiry() {
        let f = fixture(false);
        let ctx = TenantContext::new("bb-alpha");
        let earlier = AppointmentRecord::from_request("srv-1", &request("09:00", "u-3"));
        f.cache
            .set(&ctx, "appointments:barberId=barber-01", &vec![earlier.clone()], Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;

        f.repo
            .fail_next(FailureScope::Writes, RepositoryError::Rejected("shop closed".into()));
        assert!(
            f.coordinator
                .create_appointment(&ctx, &request("10:00", "u-1"), None)
                .await
                .is_err()
        );
        assert_eq!(
            cached(&f, &ctx, "appointments:barberId=barber-01").await,
            Some(vec![earlier])
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cached(&f, &ctx, "appointments:barberId=barber-01").await, None);
    }

    #[tokio::test]
    async fn test_conflict_at_check_touches_nothing() {
        let f = fixture(false);
        let ctx = TenantContext::new("bb-alpha");
        let mut rx = f.bus.subscribe();
        let existing = AppointmentRecord::from_request("srv-1", &request("10:00", "u-2"));
        let view = AppointmentView::new(vec![existing.clone()]);

        let err = f
            .coordinator
            .create_appointment(&ctx, &request("10:00", "u-1"), Some(&view))
            .await
            .unwrap_err();

        assert_eq!(err, BookingError::slot_conflict("2024-05-01", "10:00", "barber-01"));
        assert_eq!(view.snapshot(), vec![existing]);
        assert!(kinds(&mut rx).is_empty());
        assert_eq!(f.repo.calls().create, 0);
        assert_eq!(f.coordinator.stats().rejected_at_check, 1);
    }

    #[tokio::test]
    async fn test_remote_conflict_rolls_back_to_prior_state() {
        let f = fixture(false);
        let ctx = TenantContext::new("bb-alpha");
        let tenant = TenantId::parse("bb-alpha").unwrap();
        // Taken upstream but unknown to this client.
        f.repo
            .seed(&tenant, [AppointmentRecord::from_request("srv-9", &request("10:00", "u-2"))]);
        let earlier = AppointmentRecord::from_request("srv-1", &request("09:00", "u-3"));
        f.cache
            .set(&ctx, "appointments:barberId=barber-01", &vec![earlier.clone()], Duration::from_secs(300))
            .await
            .unwrap();
        let view = AppointmentView::new(vec![earlier.clone()]);
        let mut rx = f.bus.subscribe();

        let err = f
            .coordinator
            .create_appointment(&ctx, &request("10:00", "u-1"), Some(&view))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::SlotConflict { .. }));
        assert!(err.to_string().contains("just became unavailable, please choose another"));
        assert_eq!(view.snapshot(), vec![earlier.clone()]);
        assert_eq!(
            cached(&f, &ctx, "appointments:barberId=barber-01").await,
            Some(vec![earlier])
        );
        assert_eq!(cached(&f, &ctx, "appointments:all").await, None);
        assert_eq!(cached(&f, &ctx, "appointments:userId=u-1").await, None);
        assert_eq!(kinds(&mut rx), vec!["slotBlocked", "slotUnblocked"]);
        assert_eq!(f.coordinator.stats().rolled_back, 1);
        // A conflict is not an upstream failure.
        assert_eq!(f.backoff.state().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_rolls_back_and_counts_against_backoff() {
        let f = fixture(false);
        let ctx = TenantContext::new("bb-alpha");
        f.repo.fail_next(FailureScope::Writes, RepositoryError::RateLimited);
        let view = AppointmentView::default();

        let err = f
            .coordinator
            .create_appointment(&ctx, &request("10:00", "u-1"), Some(&view))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::UpstreamUnavailable(_)));
        assert!(view.is_empty());
        assert_eq!(f.backoff.state().consecutive_failures, 1);
        assert_eq!(f.repo.calls().create, 1);
        assert!(f.repo.records(&TenantId::parse("bb-alpha").unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_maps_to_stale_write() {
        let f = fixture(false);
        f.repo
            .fail_next(FailureScope::Writes, RepositoryError::Rejected("shop closed".into()));
        let err = f
            .coordinator
            .create_appointment(&TenantContext::new("bb-alpha"), &request("10:00", "u-1"), None)
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::StaleWriteRejected("shop closed".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_near_simultaneous_bookings_confirm_once() {
        let f = fixture(true);
        f.repo.set_latency(Duration::from_millis(50));
        let ctx = TenantContext::new("bb-alpha");
        let mut rx = f.bus.subscribe();
        let (view_a, view_b) = (AppointmentView::default(), AppointmentView::default());
        let (first, second) = (request("10:00", "u-1"), request("10:00", "u-2"));

        let (a, b) = tokio::join!(
            f.coordinator.create_appointment(&ctx, &first, Some(&view_a)),
            f.coordinator.create_appointment(&ctx, &second, Some(&view_b)),
        );

        let outcomes = [a, b];
        let winners: Vec<&AppointmentRecord> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(BookingError::SlotConflict { .. })))
        );

        let confirmed = kinds(&mut rx).into_iter().filter(|k| *k == "bookingConfirmed").count();
        assert_eq!(confirmed, 1);

        let barber = cached(&f, &ctx, "appointments:barberId=barber-01").await.unwrap();
        assert_eq!(barber.len(), 1);
        assert_eq!(&barber[0], winners[0]);
        assert_eq!(view_a.len() + view_b.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_frees_slot_and_clears_cache() {
        let f = fixture(false);
        let ctx = TenantContext::new("bb-alpha");
        let view = AppointmentView::default();
        let record = f
            .coordinator
            .create_appointment(&ctx, &request("10:00", "u-1"), Some(&view))
            .await
            .unwrap();
        let mut rx = f.bus.subscribe();

        let cancelled = f.coordinator.cancel_appointment(&ctx, &record.id, Some(&view)).await.unwrap();

        assert!(cancelled.is_cancelled);
        assert!(view.is_empty());
        assert_eq!(cached(&f, &ctx, "appointments:all").await, None);
        assert_eq!(kinds(&mut rx), vec!["cacheInvalidated", "slotUnblocked"]);

        // The slot can be booked again.
        assert!(
            f.coordinator
                .create_appointment(&ctx, &request("10:00", "u-2"), None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_no_tenant_fails_fast() {
        let f = fixture(true);
        let mut rx = f.bus.subscribe();
        assert_eq!(
            f.coordinator
                .create_appointment(&TenantContext::none(), &request("10:00", "u-1"), None)
                .await,
            Err(BookingError::NoTenantContext)
        );
        assert!(kinds(&mut rx).is_empty());
        assert_eq!(f.repo.calls().find_all, 0);
    }

    #[test]
    fn test_view_swap_appends_when_tentative_was_dropped() {
        let view = AppointmentView::default();
        let record = AppointmentRecord::from_request("srv-1", &request("10:00", "u-1"));
        view.swap_id("temp-1", record.clone());
        view.swap_id("temp-1", record.clone());
        assert_eq!(view.snapshot(), vec![record]);
        assert!(view.remove_id("srv-1").is_some());
        assert!(view.remove_id("srv-1").is_none());
    }
}
