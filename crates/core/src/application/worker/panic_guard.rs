// Panic isolation for the processing callback
use std::any::Any;
use tokio::task::JoinHandle;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed (the value may itself be an error)
    Success(T),
    /// Execution panicked
    Panicked(String),
    /// Task was aborted before it finished (runtime shutdown)
    Cancelled(String),
}

/// Await a spawned task, turning a panic into `PanicGuardResult::Panicked`
/// and an abort into `PanicGuardResult::Cancelled`
///
/// The callback runs in its own task so a panic unwinds that task only and
/// the worker loop survives to do its bookkeeping.
pub async fn execute_guarded<T>(handle: JoinHandle<T>) -> PanicGuardResult<T> {
    match handle.await {
        Ok(value) => PanicGuardResult::Success(value),
        Err(join_err) if join_err.is_panic() => {
            let panic_msg = panic_message(join_err.into_panic());
            error!(panic_msg = %panic_msg, "Processing task panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
        Err(join_err) => {
            // Only reachable if the runtime is shutting down under us
            error!(error = %join_err, "Processing task cancelled");
            PanicGuardResult::Cancelled(join_err.to_string())
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
