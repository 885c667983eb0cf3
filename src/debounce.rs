//! Request Debouncer - In-Flight Request Coalescing
//!
//! Collapses concurrent calls sharing a key onto one in-flight operation.
//! Every caller that joins before the operation is dropped from the pending
//! map receives a clone of the same output, success or error.
//!
//! ```text
//! caller 1 ──┐
//! caller 2 ──┼──> pending[key] ──> op() runs once ──> output cloned to all
//! caller 3 ──┘          │
//!                       └── kept for `settle_grace` after settling, then removed
//! ```

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for [`RequestDebouncer`]
#[derive(Debug, Clone, Copy)]
pub struct DebounceConfig {
    /// Pending operations older than this are treated as stuck and replaced
    pub hard_ceiling: Duration,
    /// Joiners arriving this soon after an operation started wait out the rest of it
    pub settle_window: Duration,
    /// How long a settled operation stays joinable
    pub settle_grace: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            hard_ceiling: Duration::from_secs(30),
            settle_window: Duration::from_millis(100),
            settle_grace: Duration::from_secs(1),
        }
    }
}

/// Debouncer counters. Observability only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebouncerStats {
    pub total_requests: u64,
    pub deduplicated_count: u64,
    pub active_pending: usize,
    pub stuck_replaced: u64,
}

type SharedOutput<T> = Shared<BoxFuture<'static, T>>;

struct PendingOperation {
    id: u64,
    started_at: Instant,
    /// `SharedOutput<T>` behind `Any`, since one map serves every output type
    future: Arc<dyn Any + Send + Sync>,
}

/// Deduplicates concurrent operations by key
pub struct RequestDebouncer {
    pending: Arc<DashMap<String, PendingOperation>>,
    config: DebounceConfig,
    next_id: AtomicU64,
    total_requests: AtomicU64,
    deduplicated: AtomicU64,
    stuck_replaced: AtomicU64,
}

impl RequestDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            config,
            next_id: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            deduplicated: AtomicU64::new(0),
            stuck_replaced: AtomicU64::new(0),
        }
    }

    /// Run `op` unless an equivalent operation is already in flight for `key`,
    /// in which case wait for that one instead.
    ///
    /// `op` is called while the key's map shard is locked, so it must only
    /// build the future; all work belongs inside the returned future.
    pub async fn execute<T, F, Fut>(&self, key: &str, op: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.run(key, op, |_| true).await
    }

    /// [`execute`](Self::execute) for fallible operations: a failed operation
    /// leaves the map as soon as it settles, so callers arriving afterwards
    /// start a fresh attempt. Callers that joined it still get the error.
    pub async fn execute_result<T, E, F, Fut>(&self, key: &str, op: F) -> std::result::Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        self.run(key, op, std::result::Result::<T, E>::is_ok).await
    }

    async fn run<T, F, Fut>(&self, key: &str, op: F, keep: fn(&T) -> bool) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let (future, joined_at_age) = self.join_or_start(key, op, keep);

        if let Some(age) = joined_at_age {
            if let Some(wait) = self.config.settle_window.checked_sub(age) {
                debug!(key = %key, wait_ms = wait.as_millis(), "Joined fresh operation, settling");
                tokio::time::sleep(wait).await;
            }
        }

        future.await
    }

    fn join_or_start<T, F, Fut>(
        &self,
        key: &str,
        op: F,
        keep: fn(&T) -> bool,
    ) -> (SharedOutput<T>, Option<Duration>)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get();
                let age = existing.started_at.elapsed();

                if age < self.config.hard_ceiling {
                    if let Some(future) = existing.future.downcast_ref::<SharedOutput<T>>() {
                        self.deduplicated.fetch_add(1, Ordering::Relaxed);
                        debug!(key = %key, age_ms = age.as_millis(), "Coalesced onto in-flight operation");
                        return (future.clone(), Some(age));
                    }
                    warn!(key = %key, "Pending operation has a different output type, replacing");
                } else {
                    self.stuck_replaced.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, age_secs = age.as_secs(), "Pending operation exceeded hard ceiling, starting a fresh one");
                }

                let (operation, future) = self.start(key, op, keep);
                occupied.insert(operation);
                (future, None)
            }
            Entry::Vacant(vacant) => {
                let (operation, future) = self.start(key, op, keep);
                vacant.insert(operation);
                (future, None)
            }
        }
    }

    fn start<T, F, Fut>(&self, key: &str, op: F, keep: fn(&T) -> bool) -> (PendingOperation, SharedOutput<T>)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let grace = self.config.settle_grace;
        let key_owned = key.to_string();
        let work = op();

        let future: SharedOutput<T> = async move {
            let output = work.await;
            let grace = if keep(&output) { grace } else { Duration::ZERO };
            schedule_removal(pending, key_owned, id, grace);
            output
        }
        .boxed()
        .shared();

        let operation = PendingOperation {
            id,
            started_at: Instant::now(),
            future: Arc::new(future.clone()),
        };
        (operation, future)
    }

    /// Whether an operation for `key` is currently joinable or settling.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Forget every pending operation. Existing awaiters are unaffected.
    pub fn clear(&self) {
        self.pending.clear();
    }

    pub fn stats(&self) -> DebouncerStats {
        DebouncerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            deduplicated_count: self.deduplicated.load(Ordering::Relaxed),
            active_pending: self.pending.len(),
            stuck_replaced: self.stuck_replaced.load(Ordering::Relaxed),
        }
    }
}

impl Default for RequestDebouncer {
    fn default() -> Self {
        Self::new(DebounceConfig::default())
    }
}

/// Remove operation `id` after `grace`, unless a newer operation took its key.
fn schedule_removal(
    pending: Arc<DashMap<String, PendingOperation>>,
    key: String,
    id: u64,
    grace: Duration,
) {
    if grace.is_zero() {
        pending.remove_if(&key, |_, operation| operation.id == id);
        return;
    }
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        pending.remove_if(&key, |_, operation| operation.id == id);
    });
}
