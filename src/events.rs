//! Booking event bus
//!
//! Process-wide publish/subscribe channel telling independent views (another
//! open calendar, a sidebar counter) about tentative holds, confirmations,
//! rollbacks and cache invalidations.
//!
//! Publishing is synchronous: the event is in every subscriber's queue by the
//! time `publish` returns, which lets the booking rollback emit `slotUnblocked`
//! in the same step as the cache removal.

use crate::models::AppointmentRecord;
use crate::tenant::TenantId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Events emitted by the caching and booking layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BookingEvent {
    /// A tentative hold was placed before the remote commit.
    SlotBlocked {
        tenant: TenantId,
        date: String,
        time: String,
        barber_id: String,
        tentative_id: String,
    },

    /// A tentative hold or a booking was released; the slot is selectable again.
    SlotUnblocked {
        tenant: TenantId,
        date: String,
        time: String,
        barber_id: String,
    },

    /// The remote accepted the booking; `record` carries the server id.
    BookingConfirmed {
        tenant: TenantId,
        tentative_id: String,
        record: AppointmentRecord,
    },

    /// Keys (logical, without tenant prefix) dropped from the tenant cache.
    CacheInvalidated {
        tenant: TenantId,
        keys: Vec<String>,
        /// Milliseconds since the Unix epoch
        timestamp: u64,
    },

    /// A list was re-fetched from upstream and written to the cache.
    AppointmentsRefreshed {
        tenant: TenantId,
        key: String,
        count: usize,
    },
}

impl BookingEvent {
    /// Build a `CacheInvalidated` event stamped with the current wall clock.
    pub fn cache_invalidated(tenant: TenantId, keys: Vec<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis();
        Self::CacheInvalidated {
            tenant,
            keys,
            timestamp: u64::try_from(timestamp).unwrap_or(u64::MAX),
        }
    }

    /// Tenant the event belongs to.
    pub fn tenant(&self) -> &TenantId {
        match self {
            Self::SlotBlocked { tenant, .. }
            | Self::SlotUnblocked { tenant, .. }
            | Self::BookingConfirmed { tenant, .. }
            | Self::CacheInvalidated { tenant, .. }
            | Self::AppointmentsRefreshed { tenant, .. } => tenant,
        }
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SlotBlocked { .. } => "slotBlocked",
            Self::SlotUnblocked { .. } => "slotUnblocked",
            Self::BookingConfirmed { .. } => "bookingConfirmed",
            Self::CacheInvalidated { .. } => "cacheInvalidated",
            Self::AppointmentsRefreshed { .. } => "appointmentsRefreshed",
        }
    }

    /// Serialize to JSON for handing to a presentation layer
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize booking event")
    }

    /// Deserialize from JSON
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid event.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize booking event")
    }
}

/// Configuration for the event bus
#[derive(Debug, Clone, Copy)]
pub struct EventBusConfig {
    /// Events buffered per subscriber before the slowest one starts lagging
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Snapshot of event bus counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventBusStats {
    pub published: u64,
    pub slots_blocked: u64,
    pub slots_unblocked: u64,
    pub bookings_confirmed: u64,
    pub cache_invalidations: u64,
    pub refreshes: u64,
    /// Events published while nobody was listening
    pub undelivered: u64,
}

#[derive(Debug, Default)]
struct AtomicEventBusStats {
    published: AtomicU64,
    slots_blocked: AtomicU64,
    slots_unblocked: AtomicU64,
    bookings_confirmed: AtomicU64,
    cache_invalidations: AtomicU64,
    refreshes: AtomicU64,
    undelivered: AtomicU64,
}

impl AtomicEventBusStats {
    fn record(&self, event: &BookingEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);
        let counter = match event {
            BookingEvent::SlotBlocked { .. } => &self.slots_blocked,
            BookingEvent::SlotUnblocked { .. } => &self.slots_unblocked,
            BookingEvent::BookingConfirmed { .. } => &self.bookings_confirmed,
            BookingEvent::CacheInvalidated { .. } => &self.cache_invalidations,
            BookingEvent::AppointmentsRefreshed { .. } => &self.refreshes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> EventBusStats {
        EventBusStats {
            published: self.published.load(Ordering::Relaxed),
            slots_blocked: self.slots_blocked.load(Ordering::Relaxed),
            slots_unblocked: self.slots_unblocked.load(Ordering::Relaxed),
            bookings_confirmed: self.bookings_confirmed.load(Ordering::Relaxed),
            cache_invalidations: self.cache_invalidations.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
        }
    }
}

/// Broadcast channel for [`BookingEvent`]s
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BookingEvent>,
    stats: Arc<AtomicEventBusStats>,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self {
            sender,
            stats: Arc::new(AtomicEventBusStats::default()),
        }
    }

    /// Publish to every current subscriber, returning how many received it.
    ///
    /// Having no subscribers is not an error.
    pub fn publish(&self, event: BookingEvent) -> usize {
        self.stats.record(&event);
        debug!(kind = event.kind(), tenant = %event.tenant(), "Publishing booking event");
        if let Ok(receivers) = self.sender.send(event) {
            receivers
        } else {
            self.stats.undelivered.fetch_add(1, Ordering::Relaxed);
            0
        }
    }

    /// Receive events of every tenant.
    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.sender.subscribe()
    }

    /// Receive only the events of `tenant`.
    pub fn subscribe_tenant(&self, tenant: TenantId) -> TenantSubscription {
        TenantSubscription {
            tenant,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn stats(&self) -> EventBusStats {
        self.stats.snapshot()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

/// Subscription filtered to one tenant.
pub struct TenantSubscription {
    tenant: TenantId,
    receiver: broadcast::Receiver<BookingEvent>,
}

impl TenantSubscription {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Wait for the next event of this tenant.
    ///
    /// Returns `None` once the bus is gone. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<BookingEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if *event.tenant() == self.tenant => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(tenant = %self.tenant, skipped, "Tenant subscription lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-queued event of this tenant, without waiting.
    pub fn try_recv(&mut self) -> Option<BookingEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if *event.tenant() == self.tenant => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(tenant = %self.tenant, skipped, "Tenant subscription lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain everything currently queued for this tenant.
    pub fn drain(&mut self) -> Vec<BookingEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
