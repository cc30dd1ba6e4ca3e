// Central Error Type for the crate

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl AppError {
    /// True when a producer submitted after the pool was completed
    pub fn is_queue_closed(&self) -> bool {
        matches!(
            self,
            AppError::Domain(crate::domain::DomainError::QueueClosed)
        )
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
