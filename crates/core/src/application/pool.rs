//! Pool - adaptive, self-scaling producer/consumer pool
//!
//! Producers [`submit`](Pool::submit) items; a dynamically sized set of
//! workers drains them through the caller's [`ItemProcessor`]. After every
//! state-changing event (submit, worker started, item processed, idle
//! recheck, completion) the controller recomputes the desired worker count
//! and starts or stops workers to match.
//!
//! All bookkeeping (`workers`, `active`, `pending_starts`, `pending_stops`,
//! last downscale time) sits behind one mutex, and each reconciliation pass
//! reads and writes it inside a single critical section.

use super::config::PoolConfig;
use super::scaling::{decide, ScaleUpReason, ScalingDecision, ScalingInput};
use super::worker::stop::{stop_channel, StopHandle};
use crate::domain::{ExitReason, WorkQueue, WorkerId};
use crate::error::{AppError, Result};
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{ItemProcessor, TimeProvider};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Event that caused a reconciliation pass (for logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Created,
    Submit,
    WorkerStarted,
    ItemProcessed,
    IdleRecheck,
    WorkerExited,
    Complete,
}

impl Trigger {
    fn as_str(&self) -> &'static str {
        match self {
            Trigger::Created => "created",
            Trigger::Submit => "submit",
            Trigger::WorkerStarted => "worker_started",
            Trigger::ItemProcessed => "item_processed",
            Trigger::IdleRecheck => "idle_recheck",
            Trigger::WorkerExited => "worker_exited",
            Trigger::Complete => "complete",
        }
    }
}

/// Point-in-time view of the pool's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Workers in the registry (running or just requested)
    pub registered: usize,
    /// Workers that have entered their loop
    pub active: usize,
    pub pending_starts: usize,
    pub pending_stops: usize,
    /// Items queued and not yet handed to a worker
    pub backlog: usize,
    /// Items whose callback returned Ok
    pub processed: u64,
    /// Items whose callback returned an error or panicked
    pub failed: u64,
    /// `complete()` has been called
    pub completed: bool,
}

impl PoolStats {
    /// Worker count the pool is heading towards
    pub fn current_target(&self) -> usize {
        (self.active + self.pending_starts).saturating_sub(self.pending_stops)
    }

    /// Closed, drained and without workers
    pub fn is_terminal(&self) -> bool {
        self.completed && self.registered == 0
    }
}

struct WorkerEntry {
    stop: StopHandle,
    /// Selected by a scale-down or drain; counted in `pending_stops`
    stopping: bool,
}

struct PoolState {
    workers: BTreeMap<WorkerId, WorkerEntry>,
    active: usize,
    pending_starts: usize,
    pending_stops: usize,
    last_downscale_millis: i64,
    next_worker_id: u64,
}

impl PoolState {
    fn check_invariants(&self) {
        debug_assert_eq!(
            self.workers.len(),
            self.active + self.pending_starts,
            "registry must equal active + pending starts"
        );
        debug_assert_eq!(
            self.pending_stops,
            self.workers.values().filter(|w| w.stopping).count(),
            "pending stops must equal workers marked stopping"
        );
    }
}

/// Shared state behind a [`Pool`], also owned by every worker task
pub(crate) struct PoolInner<T> {
    pub(crate) config: PoolConfig,
    pub(crate) queue: WorkQueue<T>,
    pub(crate) processor: Arc<dyn ItemProcessor<T>>,
    pub(crate) runtime: Handle,
    time_provider: Arc<dyn TimeProvider>,
    state: Mutex<PoolState>,
    idle_tx: watch::Sender<bool>,
    pub(crate) processed: AtomicU64,
    pub(crate) failed: AtomicU64,
}

/// Adaptive worker pool, generic over the item payload
///
/// Dropping the pool completes it: queued items are still drained and the
/// workers exit afterwards.
pub struct Pool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Pool<T> {
    /// Create a pool and immediately start `min_workers` workers
    ///
    /// Must be called from within a Tokio runtime; workers are spawned on it.
    ///
    /// # Errors
    /// - AppError::Config if the configuration is invalid
    /// - AppError::Runtime if no Tokio runtime is available
    pub fn new(config: PoolConfig, processor: Arc<dyn ItemProcessor<T>>) -> Result<Self> {
        Self::with_time_provider(config, processor, Arc::new(SystemTimeProvider))
    }

    /// Create a pool with an explicit clock for the downscale cooldown
    pub fn with_time_provider(
        config: PoolConfig,
        processor: Arc<dyn ItemProcessor<T>>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| AppError::Runtime(format!("pool needs a Tokio runtime: {}", e)))?;

        // The first scale-down waits a full cooldown from creation
        let now = time_provider.now_millis();
        let (idle_tx, _) = watch::channel(false);

        info!(
            min_workers = config.min_workers,
            items_per_worker = config.items_per_worker,
            max_workers = ?config.max_workers,
            cooldown_ms = config.cooldown_millis(),
            "Pool created"
        );

        let inner = Arc::new(PoolInner {
            config,
            queue: WorkQueue::new(),
            processor,
            runtime,
            time_provider,
            state: Mutex::new(PoolState {
                workers: BTreeMap::new(),
                active: 0,
                pending_starts: 0,
                pending_stops: 0,
                last_downscale_millis: now,
                next_worker_id: 1,
            }),
            idle_tx,
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });
        inner.manage_workers(Trigger::Created);

        Ok(Self { inner })
    }

    /// Enqueue one item and rescale
    ///
    /// Non-blocking; callable from any thread.
    ///
    /// # Errors
    /// - AppError::Domain(DomainError::QueueClosed) after `complete()`
    pub fn submit(&self, item: T) -> Result<()> {
        self.inner.queue.enqueue(item)?;
        self.inner.manage_workers(Trigger::Submit);
        Ok(())
    }

    /// Stop accepting items and drive the worker count to zero
    ///
    /// Irreversible and idempotent. Items already queued are still
    /// processed before the workers exit.
    pub fn complete(&self) {
        if self.inner.queue.close() {
            info!(
                backlog = self.inner.queue.len(),
                "Pool completed: no further items accepted"
            );
        }
        self.inner.manage_workers(Trigger::Complete);
    }

    pub fn is_completed(&self) -> bool {
        self.inner.queue.is_closed()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Wait until the pool is closed, drained and has no workers
    ///
    /// Never resolves unless `complete()` is called.
    pub async fn join(&self) {
        let mut idle = self.inner.idle_tx.subscribe();
        let _ = idle.wait_for(|terminal| *terminal).await;
    }

    /// `complete()` followed by `join()`
    pub async fn shutdown(self) {
        self.complete();
        self.join().await;
        let stats = self.stats();
        info!(
            processed = stats.processed,
            failed = stats.failed,
            "Pool shut down"
        );
    }
}

impl<T: Send + 'static> Drop for Pool<T> {
    fn drop(&mut self) {
        self.complete();
    }
}

impl<T: Send + 'static> PoolInner<T> {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        PoolStats {
            registered: state.workers.len(),
            active: state.active,
            pending_starts: state.pending_starts,
            pending_stops: state.pending_stops,
            backlog: self.queue.len(),
            processed: self.processed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            completed: self.queue.is_closed(),
        }
    }

    /// Reconcile the actual worker count against the desired one
    ///
    /// Safe to call from any producer or worker at any time.
    pub(crate) fn manage_workers(self: &Arc<Self>, trigger: Trigger) {
        let mut state = self.lock_state();
        state.check_invariants();

        let input = ScalingInput {
            closed: self.queue.is_closed(),
            registered: state.workers.len(),
            active: state.active,
            pending_starts: state.pending_starts,
            pending_stops: state.pending_stops,
            backlog: self.queue.len(),
            now_millis: self.time_provider.now_millis(),
            last_downscale_millis: state.last_downscale_millis,
        };

        match decide(&input, &self.config) {
            ScalingDecision::TerminalIdle => {
                if !*self.idle_tx.borrow() {
                    info!("Pool drained: all workers exited");
                    self.idle_tx.send_replace(true);
                }
            }
            ScalingDecision::Hold => {}
            ScalingDecision::CooldownActive { surplus } => {
                trace!(
                    trigger = trigger.as_str(),
                    surplus,
                    "Scale-down deferred by cooldown"
                );
            }
            ScalingDecision::ScaleUp { count, reason } => {
                let below_floor = reason == ScaleUpReason::BelowFloor;
                debug!(
                    trigger = trigger.as_str(),
                    count,
                    backlog = input.backlog,
                    current = input.current_target(),
                    below_floor,
                    "Scaling up"
                );
                self.start_workers(&mut state, count);
            }
            ScalingDecision::ScaleDown { count } => {
                let stopped = self.stop_workers(&mut state, count);
                state.last_downscale_millis = input.now_millis;
                debug!(
                    trigger = trigger.as_str(),
                    requested = count,
                    stopped,
                    backlog = input.backlog,
                    current = input.current_target(),
                    "Scaling down"
                );
            }
            ScalingDecision::Drain { count } => {
                let stopped = self.stop_workers(&mut state, count);
                debug!(
                    trigger = trigger.as_str(),
                    stopped,
                    backlog = input.backlog,
                    "Draining to zero"
                );
            }
        }
    }

    fn start_workers(self: &Arc<Self>, state: &mut PoolState, count: usize) {
        for _ in 0..count {
            let id = WorkerId::new(state.next_worker_id);
            state.next_worker_id += 1;

            let (stop, token) = stop_channel();
            state.workers.insert(
                id,
                WorkerEntry {
                    stop,
                    stopping: false,
                },
            );
            state.pending_starts += 1;

            // The task blocks on this lock before it can mark itself started
            let inner = Arc::clone(self);
            self.runtime.spawn(inner.run_worker(id, token));
        }
    }

    /// Signal up to `count` workers not already stopping; newest first
    fn stop_workers(&self, state: &mut PoolState, count: usize) -> usize {
        let mut stopped = 0;
        for (id, entry) in state
            .workers
            .iter_mut()
            .rev()
            .filter(|(_, entry)| !entry.stopping)
            .take(count)
        {
            entry.stopping = true;
            entry.stop.stop();
            stopped += 1;
            trace!(worker_id = %id, "Stop requested");
        }
        state.pending_stops += stopped;
        stopped
    }

    /// First step of a worker's loop: pending start becomes active
    pub(crate) fn mark_started(&self, id: WorkerId) {
        let mut state = self.lock_state();
        debug_assert!(state.workers.contains_key(&id), "{} not registered", id);
        debug_assert!(state.pending_starts > 0, "pending starts underflow");
        state.pending_starts = state.pending_starts.saturating_sub(1);
        state.active += 1;
    }

    /// Last step of a worker's loop
    ///
    /// A worker that was selected for stopping always gives back its pending
    /// stop, whichever exit path it took.
    pub(crate) fn deregister(&self, id: WorkerId, reason: ExitReason) {
        let mut state = self.lock_state();
        match state.workers.remove(&id) {
            Some(entry) => {
                if entry.stopping {
                    debug_assert!(state.pending_stops > 0, "pending stops underflow");
                    state.pending_stops = state.pending_stops.saturating_sub(1);
                }
            }
            None => debug_assert!(false, "{} deregistered twice", id),
        }
        debug_assert!(state.active > 0, "active count underflow");
        state.active = state.active.saturating_sub(1);

        debug!(
            worker_id = %id,
            reason = reason.as_str(),
            remaining = state.workers.len(),
            "Worker deregistered"
        );
    }
}
