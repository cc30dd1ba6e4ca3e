// Port Layer - Interfaces the pool depends on

pub mod processor;
pub mod time_provider; // For deterministic cooldown tests

// Re-exports
pub use processor::{FnProcessor, ItemProcessor, ProcessError};
pub use time_provider::TimeProvider;
