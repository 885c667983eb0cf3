//! Aggregate configuration
//!
//! Every component keeps its own config struct next to it; `BookingConfig`
//! bundles them for [`BookingSystemBuilder`](crate::BookingSystemBuilder).

use crate::backoff::BackoffConfig;
use crate::debounce::DebounceConfig;
use crate::events::EventBusConfig;
use crate::tenant_cache::CacheStrategy;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[cfg(feature = "moka")]
use crate::backends::MokaCacheConfig;

/// Configuration of a [`BookingSystem`](crate::BookingSystem)
#[derive(Debug, Clone)]
pub struct BookingConfig {
    #[cfg(feature = "moka")]
    pub moka: MokaCacheConfig,
    pub debounce: DebounceConfig,
    pub backoff: BackoffConfig,
    pub events: EventBusConfig,
    /// TTL of cached appointment lists
    pub list_strategy: CacheStrategy,
    /// TTL of the last-known copy served while the upstream is unavailable
    pub fallback_strategy: CacheStrategy,
    /// Timeout applied to every repository call
    pub remote_timeout: Duration,
    /// Whether authoritative availability checks pull a fresh remote snapshot
    pub verify_remotely: bool,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            #[cfg(feature = "moka")]
            moka: MokaCacheConfig::default(),
            debounce: DebounceConfig::default(),
            backoff: BackoffConfig::default(),
            events: EventBusConfig::default(),
            list_strategy: CacheStrategy::ShortTerm,
            fallback_strategy: CacheStrategy::LongTerm,
            remote_timeout: Duration::from_secs(10),
            verify_remotely: true,
        }
    }
}

impl BookingConfig {
    /// Defaults overlaid with environment variables
    ///
    /// - `BOOKING_REMOTE_TIMEOUT_MS`
    /// - `BOOKING_VERIFY_REMOTELY` (`true`/`false`)
    /// - `BOOKING_BACKOFF_CEILING_SECS`
    /// - `BOOKING_CACHE_CAPACITY` (with the `moka` feature)
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, "BOOKING_REMOTE_TIMEOUT_MS") {
            config.remote_timeout = Duration::from_millis(ms);
        }
        if let Some(verify) = parse_var::<bool, _>(&lookup, "BOOKING_VERIFY_REMOTELY") {
            config.verify_remotely = verify;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "BOOKING_BACKOFF_CEILING_SECS") {
            config.backoff.ceiling = Duration::from_secs(secs);
        }
        #[cfg(feature = "moka")]
        if let Some(capacity) = parse_var::<u64, _>(&lookup, "BOOKING_CACHE_CAPACITY") {
            config.moka.max_capacity = capacity;
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = %name, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
