// Tidepool Core - Adaptive, self-scaling worker pool
// NO host dependencies: callers bring items and a processing callback

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{Pool, PoolConfig, PoolStats};
pub use error::{AppError, Result};
pub use port::{FnProcessor, ItemProcessor, ProcessError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
