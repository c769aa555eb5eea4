//! # Redelivery Errors

use thiserror::Error;

/// Result type for redelivery task control
pub type RedeliveryResult<T> = Result<T, RedeliveryError>;

/// Errors surfaced by the redelivery task.
///
/// Failures on individual markers never show up here; they are logged and
/// the marker is retried or retired.
#[derive(Debug, Clone, Error)]
pub enum RedeliveryError {
    /// The background task panicked or was aborted
    #[error("Redelivery task failed: {0}")]
    TaskFailed(String),
}
