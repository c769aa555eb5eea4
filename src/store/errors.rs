//! Marker store error types
//!
//! Error codes:
//! - STORE_APPEND_FAILED (ERROR severity)
//! - STORE_FSYNC_FAILED (FATAL severity)
//! - STORE_CORRUPTION (FATAL severity)
//! - STORE_CLOSED (ERROR severity)

use std::fmt;
use std::io;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, processor continues
    Error,
    /// The store cannot be trusted; the processor must not start or continue
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Store error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Log write failed
    StoreAppendFailed,
    /// Log fsync failed
    StoreFsyncFailed,
    /// Checksum, framing or sequence failure in the log
    StoreCorruption,
    /// Operation on a closed store
    StoreClosed,
}

impl StoreErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StoreErrorCode::StoreAppendFailed => "STORE_APPEND_FAILED",
            StoreErrorCode::StoreFsyncFailed => "STORE_FSYNC_FAILED",
            StoreErrorCode::StoreCorruption => "STORE_CORRUPTION",
            StoreErrorCode::StoreClosed => "STORE_CLOSED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StoreErrorCode::StoreAppendFailed => Severity::Error,
            StoreErrorCode::StoreFsyncFailed => Severity::Fatal,
            StoreErrorCode::StoreCorruption => Severity::Fatal,
            StoreErrorCode::StoreClosed => Severity::Error,
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Marker store error with context
#[derive(Debug)]
pub struct StoreError {
    code: StoreErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StoreError {
    /// Create an append failed error
    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StoreErrorCode::StoreAppendFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create an fsync failed error
    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StoreErrorCode::StoreFsyncFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create a corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::StoreCorruption,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a corruption error with sequence number context
    pub fn corruption_at_sequence(sequence: u64, reason: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::StoreCorruption,
            message: reason.into(),
            details: Some(format!("sequence_number: {}", sequence)),
            source: None,
        }
    }

    /// Create a corruption error with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::StoreCorruption,
            message: reason.into(),
            details: Some(format!("byte_offset: {}", offset)),
            source: None,
        }
    }

    /// Create a closed-store error
    pub fn closed() -> Self {
        Self {
            code: StoreErrorCode::StoreClosed,
            message: "Marker store is closed".into(),
            details: None,
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
