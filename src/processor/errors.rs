//! # Processor Errors

use thiserror::Error;

use crate::redelivery::RedeliveryError;
use crate::store::{StoreError, StoreErrorCode};

/// Result type for processor operations
pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Errors returned to the host by the marker processor
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Marker store error: {0}")]
    Store(#[from] StoreError),

    #[error("Processor not initialized")]
    NotInitialized,

    #[error("Processor already initialized")]
    AlreadyInitialized,

    #[error("Processor closed")]
    Closed,

    #[error("No tokio runtime available to run redelivery")]
    NoRuntime,

    #[error("Invalid marker record: {0}")]
    Decode(String),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error(transparent)]
    Redelivery(#[from] RedeliveryError),
}

impl ProcessorError {
    /// Returns true if the host should replay the record that caused this.
    ///
    /// A closed store never reopens under the same processor.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessorError::Store(e) => !e.is_fatal() && e.code() != StoreErrorCode::StoreClosed,
            ProcessorError::Commit(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_retryable_classification() {
        let interrupted = io::Error::new(io::ErrorKind::Interrupted, "write");
        assert!(ProcessorError::Store(StoreError::append_failed("put", interrupted)).is_retryable());
        assert!(!ProcessorError::Store(StoreError::closed()).is_retryable());
        assert!(!ProcessorError::Store(StoreError::corruption("bad")).is_retryable());
        assert!(ProcessorError::Commit("offsets".into()).is_retryable());
        assert!(!ProcessorError::NotInitialized.is_retryable());
    }
}
