// Application Layer - Pool, scaling controller and worker loop

pub mod config;
pub mod constants;
pub mod pool;
pub mod scaling;
pub mod worker;

// Re-exports
pub use config::PoolConfig;
pub use pool::{Pool, PoolStats};
pub use scaling::{decide, desired_workers, ScalingDecision, ScalingInput};
pub use worker::{stop_channel, StopHandle, StopToken};
