//! Upstream backoff
//!
//! Tracks consecutive upstream failures per resource class and gates new
//! remote calls behind an exponentially growing window, capped at a ceiling.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Resource class of appointment reads and writes.
pub const APPOINTMENTS: &str = "appointments";

/// Configuration for [`BackoffController`]
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Window after the first blocking failure; doubles per further failure
    pub base: Duration,
    /// Upper bound on any window
    pub ceiling: Duration,
    /// Failures at the start of a streak that do not block at all
    pub immediate_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            ceiling: Duration::from_secs(300),
            immediate_retries: 1,
        }
    }
}

impl BackoffConfig {
    /// Window opened by failure number `failures` (1-based) of a streak:
    /// `min(base * 2^(failures-1), ceiling)`, or zero while retries are immediate.
    pub fn window_for(&self, failures: u32) -> Duration {
        if failures == 0 || failures <= self.immediate_retries {
            return Duration::ZERO;
        }
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.ceiling, |window| window.min(self.ceiling))
    }
}

/// Snapshot of a controller's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    pub consecutive_failures: u32,
    /// `None` when no window has been opened in the current streak
    pub blocked_until: Option<Instant>,
}

/// Failure streak tracker for one resource class
pub struct BackoffController {
    class: String,
    config: BackoffConfig,
    state: Mutex<BackoffState>,
}

impl BackoffController {
    pub fn new(class: impl Into<String>, config: BackoffConfig) -> Self {
        Self {
            class: class.into(),
            config,
            state: Mutex::new(BackoffState {
                consecutive_failures: 0,
                blocked_until: None,
            }),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// True while a backoff window is open.
    pub fn should_block(&self) -> bool {
        self.state
            .lock()
            .blocked_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Time left in the current window.
    pub fn remaining(&self) -> Duration {
        self.state
            .lock()
            .blocked_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(Instant::now()))
    }

    /// Count a failure and open (or extend) the backoff window.
    ///
    /// Returns the window length applied. `blocked_until` never moves earlier.
    pub fn record_failure(&self) -> Duration {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let window = self.config.window_for(state.consecutive_failures);

        if !window.is_zero() {
            let candidate = Instant::now() + window;
            state.blocked_until = Some(state.blocked_until.map_or(candidate, |until| until.max(candidate)));
            warn!(
                class = %self.class,
                failures = state.consecutive_failures,
                window_ms = window.as_millis(),
                "Upstream failing, backing off"
            );
        } else {
            debug!(class = %self.class, failures = state.consecutive_failures, "Upstream failure, retry allowed");
        }
        window
    }

    /// Reset the streak.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.consecutive_failures > 0 {
            info!(class = %self.class, failures = state.consecutive_failures, "Upstream recovered, backoff reset");
        }
        state.consecutive_failures = 0;
        state.blocked_until = None;
    }

    pub fn state(&self) -> BackoffState {
        *self.state.lock()
    }
}

/// Process-wide map of resource class to its shared controller
pub struct BackoffRegistry {
    controllers: DashMap<String, Arc<BackoffController>>,
    config: BackoffConfig,
}

impl BackoffRegistry {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            controllers: DashMap::new(),
            config,
        }
    }

    /// Controller for `class`, created on first use.
    pub fn controller(&self, class: &str) -> Arc<BackoffController> {
        if let Some(existing) = self.controllers.get(class) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.controllers
                .entry(class.to_string())
                .or_insert_with(|| Arc::new(BackoffController::new(class, self.config)))
                .value(),
        )
    }

    /// Reset every controller's streak.
    pub fn reset(&self) {
        for controller in &self.controllers {
            controller.value().record_success();
        }
    }
}

impl Default for BackoffRegistry {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
