// Worker - item consumption loop

mod panic_guard;
pub mod stop;

pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use stop::{stop_channel, StopHandle, StopToken};

use super::pool::{PoolInner, Trigger};
use crate::domain::{Dequeued, ExitReason, WorkerId};
use crate::port::ProcessError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// What woke a worker up
enum Step<T> {
    Item(T),
    EndOfStream,
    StopRequested,
    IdleRecheck,
}

impl<T: Send + 'static> PoolInner<T> {
    /// Run one worker until end-of-stream or an honoured stop request
    ///
    /// Loop: dequeue -> process -> check own stop -> reconcile. A dequeued
    /// item is always processed before the stop flag is looked at. Once the
    /// queue is closed a stopped worker keeps draining until end-of-stream,
    /// so nothing queued before `complete()` is left behind.
    pub(crate) async fn run_worker(self: Arc<Self>, id: WorkerId, mut stop: StopToken) {
        self.mark_started(id);
        debug!(worker_id = %id, "Worker started");
        self.manage_workers(Trigger::WorkerStarted);

        let reason = loop {
            if self.should_exit(&stop) {
                break ExitReason::Stopped;
            }

            let draining = self.queue.is_closed();
            let step = tokio::select! {
                biased;
                next = self.queue.dequeue() => match next {
                    Dequeued::Item(item) => Step::Item(item),
                    Dequeued::EndOfStream => Step::EndOfStream,
                },
                // A closed queue never blocks, so the stop flag is irrelevant there
                _ = stop.wait(), if !draining => Step::StopRequested,
                _ = sleep(self.config.idle_recheck) => Step::IdleRecheck,
            };

            match step {
                Step::Item(item) => {
                    self.process_item(id, item).await;
                    if self.should_exit(&stop) {
                        break ExitReason::Stopped;
                    }
                    self.manage_workers(Trigger::ItemProcessed);
                }
                Step::EndOfStream => break ExitReason::EndOfStream,
                Step::StopRequested => {
                    // Re-evaluated at the top of the loop
                }
                Step::IdleRecheck => self.manage_workers(Trigger::IdleRecheck),
            }
        };

        self.deregister(id, reason);
        debug!(worker_id = %id, reason = %reason, "Worker stopped");
        self.manage_workers(Trigger::WorkerExited);
    }

    fn should_exit(&self, stop: &StopToken) -> bool {
        stop.is_stopped() && !self.queue.is_closed()
    }

    /// Run the callback in its own task so a panic cannot take the worker down
    async fn process_item(&self, id: WorkerId, item: T) {
        let processor = Arc::clone(&self.processor);
        let handle = self
            .runtime
            .spawn(async move { processor.process(item).await });

        let outcome = match execute_guarded(handle).await {
            PanicGuardResult::Success(result) => result,
            PanicGuardResult::Panicked(msg) => Err(ProcessError::Panicked(msg)),
            PanicGuardResult::Cancelled(msg) => Err(ProcessError::failed(msg)),
        };

        match outcome {
            Ok(()) => {
                self.processed.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                warn!(worker_id = %id, error = %e, "Item processing failed");
                self.processor.on_failure(&e);
            }
        }
    }
}
