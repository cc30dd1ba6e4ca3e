// Item Processor Port
// The caller-supplied callback invoked once per item by exactly one worker

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

/// Processing failure (opaque to the pool)
///
/// The pool never classifies or retries these; it logs them, counts them and
/// hands them to [`ItemProcessor::on_failure`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Processing failed: {0}")]
    Failed(String),

    #[error("Processing panicked: {0}")]
    Panicked(String),
}

impl ProcessError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProcessError::Failed(message.into())
    }
}

/// Item Processor trait
///
/// Implementations must not assume they run on any particular thread or task.
#[async_trait]
pub trait ItemProcessor<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    /// Process one item
    ///
    /// # Errors
    /// Any error is confined to the worker that ran it; the worker still
    /// performs its post-item bookkeeping and keeps looping.
    async fn process(&self, item: T) -> Result<(), ProcessError>;

    /// Error sink, called on the worker after a failed or panicked item
    fn on_failure(&self, _error: &ProcessError) {}
}

/// Adapter turning an async closure into an [`ItemProcessor`]
///
/// # Example
/// ```text
/// let processor = FnProcessor::new(|line: String| async move {
///     println!("{line}");
///     Ok(())
/// });
/// ```
pub struct FnProcessor<F> {
    f: F,
}

impl<F> FnProcessor<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, F, Fut> ItemProcessor<T> for FnProcessor<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProcessError>> + Send + 'static,
{
    async fn process(&self, item: T) -> Result<(), ProcessError> {
        (self.f)(item).await
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

    /// Records every delivered item, with optional gating and fault injection
    pub struct RecordingProcessor<T> {
        delivered: Mutex<Vec<T>>,
        failures: Mutex<Vec<ProcessError>>,
        in_flight: AtomicUsize,
        completed: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
        delay: Option<Duration>,
        fail_when: Option<Predicate<T>>,
        panic_when: Option<Predicate<T>>,
    }

    impl<T> RecordingProcessor<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        pub fn new() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                failures: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                gate: None,
                delay: None,
                fail_when: None,
                panic_when: None,
            }
        }

        /// Hold every item until [`release`](Self::release) or [`open_gate`](Self::open_gate)
        pub fn gated(mut self) -> Self {
            self.gate = Some(Arc::new(Semaphore::new(0)));
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn failing_when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
            self.fail_when = Some(Box::new(predicate));
            self
        }

        pub fn panicking_when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
            self.panic_when = Some(Box::new(predicate));
            self
        }

        /// Let `n` held items through
        pub fn release(&self, n: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(n);
            }
        }

        /// Let every current and future item through
        pub fn open_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.close();
            }
        }

        pub fn delivered(&self) -> Vec<T> {
            self.delivered.lock().unwrap().clone()
        }

        pub fn delivered_count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }

        pub fn failures(&self) -> Vec<ProcessError> {
            self.failures.lock().unwrap().clone()
        }

        /// Items currently inside `process`
        pub fn in_flight(&self) -> usize {
            self.in_flight.load(Ordering::SeqCst)
        }

        /// Items that left `process` normally (success or error)
        pub fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
    }

    impl<T> Default for RecordingProcessor<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl<T> ItemProcessor<T> for RecordingProcessor<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        async fn process(&self, item: T) -> Result<(), ProcessError> {
            self.delivered.lock().unwrap().push(item.clone());
            self.in_flight.fetch_add(1, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                // Closed semaphore means the gate is open for good
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panic_when.as_ref().is_some_and(|p| p(&item)) {
                panic!("injected panic"); // Actually panic for panic isolation testing
            }
            self.completed.fetch_add(1, Ordering::SeqCst);

            if self.fail_when.as_ref().is_some_and(|p| p(&item)) {
                return Err(ProcessError::failed("injected failure"));
            }
            Ok(())
        }

        fn on_failure(&self, error: &ProcessError) {
            self.failures.lock().unwrap().push(error.clone());
        }
    }
}
