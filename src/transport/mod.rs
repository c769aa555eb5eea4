//! Data-log collaborators
//!
//! The redelivery task needs two things from the data log: a point read of
//! the original message and an append of its copy. Both are network calls
//! in a real deployment, so the traits are async.

mod errors;
mod memory;

pub use errors::{TransportError, TransportResult};
pub use memory::MemoryLog;

use async_trait::async_trait;

use crate::marker::MessageRef;

/// A record header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name
    pub key: String,
    /// Header bytes
    pub value: Vec<u8>,
}

impl Header {
    /// Create a header
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Content of a data-log record, without its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRecord {
    /// Record key (also drives partition choice)
    pub key: Option<Vec<u8>>,
    /// Record value
    pub value: Option<Vec<u8>>,
    /// Record headers, in order
    pub headers: Vec<Header>,
}

impl LogRecord {
    /// Create a record with a key and value
    pub fn new(key: Option<Vec<u8>>, value: Option<Vec<u8>>) -> Self {
        Self {
            key,
            value,
            headers: Vec::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }
}

/// Confirmation that an append is durable in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    /// Partition the record landed in
    pub partition: u32,
    /// Offset assigned to the record
    pub offset: u64,
}

impl PublishAck {
    /// Location of the published copy
    pub fn message(&self) -> MessageRef {
        MessageRef::new(self.partition, self.offset)
    }
}

/// Point reads from the data log.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Read the record at `message` in `topic`.
    ///
    /// Returns `Ok(None)` when the offset no longer exists (for example
    /// after retention removed it); errors mean the read itself failed.
    async fn fetch(&self, topic: &str, message: MessageRef) -> TransportResult<Option<LogRecord>>;
}

/// Appends to the data log.
#[async_trait]
pub trait RecordPublisher: Send + Sync {
    /// Append `record` to `topic`.
    ///
    /// Must return `Ok` only once the log has durably accepted the record.
    async fn publish(&self, topic: &str, record: LogRecord) -> TransportResult<PublishAck>;
}
