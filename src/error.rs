//! Error taxonomy for tenant cache and booking operations

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the caching and booking layer.
///
/// `Clone` is required because a single debounced upstream result is handed
/// to every caller that joined it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BookingError {
    /// The call carried no resolvable tenant. Never defaulted.
    #[error("no tenant context for this operation")]
    NoTenantContext,

    /// A cached or authoritative tier found a competing booking.
    #[error("time {date} {time} with barber {barber_id} just became unavailable, please choose another")]
    SlotConflict {
        date: String,
        time: String,
        barber_id: String,
    },

    /// Network failure, 5xx, 429 or timeout talking to the upstream.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The remote create was rejected after the local optimistic commit.
    #[error("remote rejected the booking: {0}")]
    StaleWriteRejected(String),

    /// The backing cache store failed. Callers may continue without cache.
    #[error("cache backend failure: {0}")]
    Cache(String),

    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl BookingError {
    /// Conflict for the given slot coordinates.
    pub fn slot_conflict(
        date: impl Into<String>,
        time: impl Into<String>,
        barber_id: impl Into<String>,
    ) -> Self {
        Self::SlotConflict {
            date: date.into(),
            time: time.into(),
            barber_id: barber_id.into(),
        }
    }

    /// Whether the caller can recover by choosing another slot or retrying later.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SlotConflict { .. } | Self::UpstreamUnavailable(_) | Self::Cache(_)
        )
    }

    /// Whether this error should count against the upstream backoff window.
    #[must_use]
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

/// Errors reported by an [`AppointmentRepository`](crate::traits::AppointmentRepository).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// The slot is already held by another appointment.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The write was refused for a reason other than a slot conflict.
    #[error("rejected: {0}")]
    Rejected(String),

    /// HTTP 429 or equivalent.
    #[error("rate limited")]
    RateLimited,

    /// Network error or 5xx.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl From<RepositoryError> for BookingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // Conflicts carry no slot coordinates here; the coordinator rebuilds
            // a proper SlotConflict where it knows them.
            RepositoryError::Conflict(reason) | RepositoryError::Rejected(reason) => {
                Self::StaleWriteRejected(reason)
            }
            RepositoryError::RateLimited => Self::UpstreamUnavailable("rate limited".to_string()),
            RepositoryError::Unavailable(reason) => Self::UpstreamUnavailable(reason),
            RepositoryError::Timeout(after) => {
                Self::UpstreamUnavailable(format!("timed out after {after:?}"))
            }
            RepositoryError::NotFound(what) => Self::Unknown(format!("not found: {what}")),
            RepositoryError::Other(reason) => Self::Unknown(reason),
        }
    }
}

/// Result type for booking-layer operations.
pub type Result<T> = std::result::Result<T, BookingError>;
