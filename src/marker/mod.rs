//! Marker types
//!
//! A marker is a control record on the marker log. A Start marker says that
//! processing of one data-log message has begun; a Complete marker says it
//! has finished. Markers are keyed by the location of the message they
//! refer to.

mod codec;

pub use codec::{decode_key, decode_value, encode_key, encode_value};

use std::fmt;

use serde::Serialize;

/// Location of a message in the data log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageRef {
    /// Data-log partition
    pub partition: u32,
    /// Offset within the partition
    pub offset: u64,
}

impl MessageRef {
    /// Create a new message reference
    pub fn new(partition: u32, offset: u64) -> Self {
        Self { partition, offset }
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}

/// Identity of one attempt to process a message.
///
/// In practice this is the partition and offset of the original message,
/// so the key is unique per data-log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MarkerKey {
    /// Partition of the original message
    pub partition: u32,
    /// Offset of the original message
    pub offset: u64,
}

impl MarkerKey {
    /// Create a new marker key
    pub fn new(partition: u32, offset: u64) -> Self {
        Self { partition, offset }
    }

    /// The data-log location this key was derived from
    pub fn message(&self) -> MessageRef {
        MessageRef::new(self.partition, self.offset)
    }
}

impl From<MessageRef> for MarkerKey {
    fn from(message: MessageRef) -> Self {
        Self::new(message.partition, message.offset)
    }
}

impl fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}

/// Payload of a Start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartMarker {
    /// Where to fetch the original message from
    pub message: MessageRef,
    /// Producer timestamp of the marker record, milliseconds since the epoch
    pub started_at: u64,
}

impl StartMarker {
    /// Create a new start marker
    pub fn new(message: MessageRef, started_at: u64) -> Self {
        Self {
            message,
            started_at,
        }
    }
}

/// Value of a marker record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkerValue {
    /// Processing of the referenced message started
    Start(StartMarker),
    /// Processing finished; carries no payload
    Complete,
}

impl MarkerValue {
    /// Build a Start value for the message at `message`
    pub fn start(message: MessageRef, started_at: u64) -> Self {
        MarkerValue::Start(StartMarker::new(message, started_at))
    }

    /// Returns true for Start markers
    pub fn is_start(&self) -> bool {
        matches!(self, MarkerValue::Start(_))
    }

    /// Returns the start payload, if any
    pub fn as_start(&self) -> Option<&StartMarker> {
        match self {
            MarkerValue::Start(start) => Some(start),
            MarkerValue::Complete => None,
        }
    }
}
