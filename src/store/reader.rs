//! Marker log reader
//!
//! Replay rules:
//! - Records are read strictly in order from byte 0
//! - Every record's checksum is validated
//! - Sequence numbers must start at 1 and increase by exactly 1
//! - A complete record that fails validation is corruption and halts replay
//! - A length prefix that matches no record size is corruption, even at the
//!   end of the file
//!
//! A record cut short at the end of the file was never acknowledged (the
//! append is acknowledged only after fsync), so it is reported as a torn
//! tail instead of corruption.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::errors::{StoreError, StoreResult};
use super::record::{is_valid_record_length, StoreRecord};

/// Sequential reader over a marker log file.
pub struct StoreLogReader {
    log_path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
    last_sequence: u64,
    torn_tail: bool,
}

impl StoreLogReader {
    /// Opens a marker log for reading.
    ///
    /// # Errors
    ///
    /// Returns `STORE_CORRUPTION` if the file cannot be opened.
    pub fn open(log_path: &Path) -> StoreResult<Self> {
        let file = File::open(log_path).map_err(|e| {
            StoreError::corruption(format!(
                "Failed to open marker log: {}: {}",
                log_path.display(),
                e
            ))
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| StoreError::corruption(format!("Failed to read marker log metadata: {}", e)))?
            .len();

        Ok(Self {
            log_path: log_path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
            last_sequence: 0,
            torn_tail: false,
        })
    }

    /// Returns the path to the log file.
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Byte offset just past the last valid record read.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Returns the last successfully read sequence number.
    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence
    }

    /// Returns true if reading stopped at an incomplete final record.
    pub fn has_torn_tail(&self) -> bool {
        self.torn_tail
    }

    /// Reads the next record.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` if a record was read
    /// - `Ok(None)` at end of file, or at a torn tail
    /// - `Err(StoreError)` on corruption
    pub fn read_next(&mut self) -> StoreResult<Option<StoreRecord>> {
        if self.torn_tail || self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < 4 {
            self.torn_tail = true;
            return Ok(None);
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            StoreError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read record length: {}", e),
            )
        })?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        // A damaged length must not pass for a torn tail
        if !is_valid_record_length(record_length as usize) {
            return Err(StoreError::corruption_at_offset(
                self.current_offset,
                format!("Invalid record length: {}", record_length),
            ));
        }

        if record_length > remaining {
            self.torn_tail = true;
            return Ok(None);
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut record_buf[4..]).map_err(|e| {
            StoreError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read record body: {}", e),
            )
        })?;

        let (record, consumed) = StoreRecord::deserialize(&record_buf).map_err(|e| {
            StoreError::corruption_at_offset(self.current_offset, e.to_string())
        })?;

        let expected = self.last_sequence + 1;
        if record.sequence_number != expected {
            return Err(StoreError::corruption_at_sequence(
                record.sequence_number,
                format!(
                    "Non-sequential sequence number: expected {}, got {}",
                    expected, record.sequence_number
                ),
            ));
        }

        self.current_offset += consumed as u64;
        self.last_sequence = record.sequence_number;

        Ok(Some(record))
    }

    /// Reads all remaining records.
    pub fn read_all(&mut self) -> StoreResult<Vec<StoreRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_next()? {
            records.push(record);
        }
        Ok(records)
    }
}
