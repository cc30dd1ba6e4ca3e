// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The queue was completed; producers must stop submitting.
    #[error("Queue closed: no further items are accepted")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, DomainError>;
