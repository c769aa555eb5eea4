//! # Transport Errors

use thiserror::Error;

/// Result type for data-log operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Data-log errors
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Broker or connection unavailable
    #[error("Data log unavailable: {0}")]
    Unavailable(String),

    /// Request did not complete in time; the outcome is unknown
    #[error("Data log request timed out after {0}ms")]
    Timeout(u64),

    /// Topic does not exist
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// Partition does not exist in the topic
    #[error("Unknown partition {partition} in topic {topic}")]
    UnknownPartition { topic: String, partition: u32 },

    /// Append refused by the log
    #[error("Publish rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Unavailable(_) | TransportError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Unavailable("down".into()).is_transient());
        assert!(TransportError::Timeout(500).is_transient());
        assert!(!TransportError::Rejected("too large".into()).is_transient());
        assert!(!TransportError::UnknownTopic("t".into()).is_transient());
    }
}
