// Pool constants (no magic values)
use std::time::Duration;

/// Default floor on concurrent workers while the pool accepts items
pub const DEFAULT_MIN_WORKERS: usize = 1;

/// Default target backlog-to-worker ratio
pub const DEFAULT_ITEMS_PER_WORKER: usize = 5;

/// Minimum time between two scale-down decisions (6s)
pub const DOWNSCALE_COOLDOWN: Duration = Duration::from_millis(6000);

/// How long an idle worker waits on an empty queue before re-running
/// reconciliation (6s)
pub const IDLE_RECHECK_INTERVAL: Duration = Duration::from_millis(6000);
