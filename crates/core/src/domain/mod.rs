// Domain Layer - Work queue and worker identity

pub mod error;
pub mod queue;
pub mod worker;

// Re-exports
pub use error::DomainError;
pub use queue::{Dequeued, WorkQueue};
pub use worker::{ExitReason, WorkerId};
