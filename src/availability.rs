//! Slot availability
//!
//! Tiers are consulted in order and the first conflict wins:
//!
//! 1. the caller's local snapshot (synchronous, may be stale)
//! 2. the tenant's per-barber list cache
//! 3. the tenant's per-user list cache
//! 4. the tenant's global list cache
//! 5. optionally, a fresh remote read of the barber's appointments
//!
//! A failing remote tier never fails the check; the cached verdict stands.

use crate::appointments::AppointmentLoader;
use crate::error::Result;
use crate::models::{AppointmentFilter, AppointmentRecord, Slot};
use crate::tenant::TenantContext;
use crate::tenant_cache::TenantAwareCache;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a conflict was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    BarberCache,
    UserCache,
    GlobalCache,
    Remote,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::BarberCache => "barber-cache",
            Self::UserCache => "user-cache",
            Self::GlobalCache => "global-cache",
            Self::Remote => "remote",
        };
        f.write_str(name)
    }
}

/// Outcome of an availability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Free,
    Conflict(Tier),
}

impl Verdict {
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }
}

/// Multi-tier availability evaluator
pub struct AvailabilityChecker {
    cache: Arc<TenantAwareCache>,
    loader: Arc<AppointmentLoader>,
    verify_remotely: bool,
}

impl AvailabilityChecker {
    pub fn new(cache: Arc<TenantAwareCache>, loader: Arc<AppointmentLoader>, verify_remotely: bool) -> Self {
        Self {
            cache,
            loader,
            verify_remotely,
        }
    }

    /// Immediate answer from what the caller already holds.
    pub fn is_available(slot: &Slot, local: &[AppointmentRecord]) -> bool {
        slot.find_conflict(local).is_none()
    }

    /// Run every tier in order, stopping at the first conflict.
    ///
    /// `user_id` enables the per-user tier.
    ///
    /// # Errors
    ///
    /// `NoTenantContext` only; remote failures degrade to the cached verdict.
    pub async fn check(
        &self,
        ctx: &TenantContext,
        slot: &Slot,
        user_id: Option<&str>,
        local: &[AppointmentRecord],
    ) -> Result<Verdict> {
        let tenant = ctx.require()?;

        if !Self::is_available(slot, local) {
            return Ok(self.conflict(Tier::Local, slot));
        }

        let barber = AppointmentFilter::barber(&slot.barber_id);
        if self.cached_conflict(ctx, &barber, slot).await {
            return Ok(self.conflict(Tier::BarberCache, slot));
        }
        if let Some(user_id) = user_id {
            let user = AppointmentFilter::user(user_id);
            if self.cached_conflict(ctx, &user, slot).await {
                return Ok(self.conflict(Tier::UserCache, slot));
            }
        }
        if self.cached_conflict(ctx, &AppointmentFilter::all(), slot).await {
            return Ok(self.conflict(Tier::GlobalCache, slot));
        }

        if self.verify_remotely {
            match self.loader.fetch_fresh(ctx, &barber).await {
                Ok(records) if slot.find_conflict(&records).is_some() => {
                    return Ok(self.conflict(Tier::Remote, slot));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "Remote availability check failed, trusting cached tiers");
                }
            }
        }

        Ok(Verdict::Free)
    }

    /// `check` reduced to a yes/no.
    ///
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
        Ok(self.check(ctx, slot, user_id, local).await?.is_free())
    }

    /// Whether the cached list for `filter` holds a live booking on `slot`.
    /// A list that is not cached reports no conflict.
    async fn cached_conflict(&self, ctx: &TenantContext, filter: &AppointmentFilter, slot: &Slot) -> bool {
        self.cache
            .get::<Vec<AppointmentRecord>>(ctx, &filter.cache_key())
            .await
            .is_some_and(|records| slot.find_conflict(&records).is_some())
    }

    fn conflict(&self, tier: Tier, slot: &Slot) -> Verdict {
        debug!(tier = %tier, date = %slot.date, time = %slot.time, barber = %slot.barber_id, "Slot taken");
        Verdict::Conflict(tier)
    }
}
