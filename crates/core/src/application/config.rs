// Pool configuration

use super::constants::{
    DEFAULT_ITEMS_PER_WORKER, DEFAULT_MIN_WORKERS, DOWNSCALE_COOLDOWN, IDLE_RECHECK_INTERVAL,
};
use crate::error::{AppError, Result};
use std::time::Duration;

/// Sizing and timing knobs for a [`Pool`](super::Pool)
///
/// All fields are fixed once the pool is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Floor on concurrent workers while the pool accepts items (>= 1)
    pub min_workers: usize,
    /// Target backlog-to-worker ratio used to size up (>= 1)
    pub items_per_worker: usize,
    /// Optional ceiling on the desired worker count (>= min_workers)
    pub max_workers: Option<usize>,
    /// Minimum time between two scale-down decisions
    pub downscale_cooldown: Duration,
    /// How often an idle worker re-runs reconciliation
    pub idle_recheck: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            items_per_worker: DEFAULT_ITEMS_PER_WORKER,
            max_workers: None,
            downscale_cooldown: DOWNSCALE_COOLDOWN,
            idle_recheck: IDLE_RECHECK_INTERVAL,
        }
    }
}

impl PoolConfig {
    pub fn new(min_workers: usize, items_per_worker: usize) -> Self {
        Self {
            min_workers,
            items_per_worker,
            ..Default::default()
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn with_downscale_cooldown(mut self, cooldown: Duration) -> Self {
        self.downscale_cooldown = cooldown;
        self
    }

    pub fn with_idle_recheck(mut self, interval: Duration) -> Self {
        self.idle_recheck = interval;
        self
    }

    /// Cooldown as whole milliseconds, saturating
    pub(crate) fn cooldown_millis(&self) -> i64 {
        i64::try_from(self.downscale_cooldown.as_millis()).unwrap_or(i64::MAX)
    }

    /// Check the constraints every pool relies on
    ///
    /// # Errors
    /// - AppError::Config describing the first violated constraint
    pub fn validate(&self) -> Result<()> {
        if self.min_workers == 0 {
            return Err(AppError::Config("min_workers must be at least 1".into()));
        }
        if self.items_per_worker == 0 {
            return Err(AppError::Config(
                "items_per_worker must be at least 1".into(),
            ));
        }
        if let Some(max) = self.max_workers {
            if max < self.min_workers {
                return Err(AppError::Config(format!(
                    "max_workers ({}) must not be below min_workers ({})",
                    max, self.min_workers
                )));
            }
        }
        if self.idle_recheck.is_zero() {
            return Err(AppError::Config("idle_recheck must be non-zero".into()));
        }
        Ok(())
    }
}
