//! Scaling - decides how many workers to start or stop
//!
//! Pure arithmetic over a snapshot of the pool's counters. The pool takes
//! the snapshot and applies the decision under a single lock, so this module
//! never sees concurrent state.
//!
//! - Floor violations and backlog growth scale up immediately
//! - Scale-down is gated by a global cooldown to damp oscillation
//! - Once the queue is closed every remaining worker is asked to stop

use super::config::PoolConfig;

/// Snapshot of pool state fed to [`decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingInput {
    pub closed: bool,
    /// Handles in the registry (running or just requested)
    pub registered: usize,
    pub active: usize,
    pub pending_starts: usize,
    pub pending_stops: usize,
    pub backlog: usize,
    pub now_millis: i64,
    pub last_downscale_millis: i64,
}

impl ScalingInput {
    /// Workers the pool is heading towards once in-flight requests settle
    pub fn current_target(&self) -> usize {
        (self.active + self.pending_starts).saturating_sub(self.pending_stops)
    }
}

/// Why workers are being added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleUpReason {
    BelowFloor,
    Backlog,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDecision {
    /// Closed, drained of workers: nothing will ever happen again
    TerminalIdle,
    /// Counts already match
    Hold,
    /// Surplus exists but the cooldown has not elapsed
    CooldownActive { surplus: usize },
    ScaleUp { count: usize, reason: ScaleUpReason },
    ScaleDown { count: usize },
    /// Queue closed: stop everything still targeted
    Drain { count: usize },
}

/// `max(min_workers, ceil(backlog / items_per_worker))`, capped by `max_workers`
pub fn desired_workers(backlog: usize, config: &PoolConfig) -> usize {
    let per_worker = config.items_per_worker.max(1);
    let by_backlog = backlog.div_ceil(per_worker);
    let desired = by_backlog.max(config.min_workers);
    match config.max_workers {
        Some(max) => desired.min(max.max(config.min_workers)),
        None => desired,
    }
}

/// Decide the next scaling action for a snapshot
pub fn decide(input: &ScalingInput, config: &PoolConfig) -> ScalingDecision {
    if input.closed && input.registered == 0 {
        return ScalingDecision::TerminalIdle;
    }

    let current = input.current_target();

    if input.closed {
        return if current > 0 {
            ScalingDecision::Drain { count: current }
        } else {
            ScalingDecision::Hold
        };
    }

    if config.min_workers > current {
        return ScalingDecision::ScaleUp {
            count: config.min_workers - current,
            reason: ScaleUpReason::BelowFloor,
        };
    }

    let desired = desired_workers(input.backlog, config);
    if desired > current {
        ScalingDecision::ScaleUp {
            count: desired - current,
            reason: ScaleUpReason::Backlog,
        }
    } else if desired < current {
        let surplus = current - desired;
        let elapsed = input.now_millis.saturating_sub(input.last_downscale_millis);
        if elapsed >= config.cooldown_millis() {
            ScalingDecision::ScaleDown { count: surplus }
        } else {
            ScalingDecision::CooldownActive { surplus }
        }
    } else {
        ScalingDecision::Hold
    }
}
