//! Marker log writer with fsync enforcement
//!
//! - Every append is followed by fsync
//! - A record is acknowledged only after fsync succeeds
//! - Bytes past the last acknowledged record are cut before the next append
//! - A writer that cannot cut them refuses further appends
//! - Rewrites (compaction) go through a temporary file and an atomic rename

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use super::errors::{StoreError, StoreResult};
use super::record::StoreRecord;

/// Append-only writer for the marker log.
pub struct StoreLogWriter {
    log_path: PathBuf,
    file: File,
    next_sequence: u64,
    /// File length after the last acknowledged record
    valid_len: u64,
    /// Set when a failed append could not be rolled back
    broken: bool,
}

impl StoreLogWriter {
    /// Opens the log at `log_path` for appending, continuing at `next_sequence`.
    ///
    /// The caller determines `next_sequence` by replaying the log first.
    pub fn open(log_path: &Path, next_sequence: u64) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| {
                StoreError::append_failed(
                    format!("Failed to open marker log: {}", log_path.display()),
                    e,
                )
            })?;

        let valid_len = file_len(&file, log_path)?;

        Ok(Self {
            log_path: log_path.to_path_buf(),
            file,
            next_sequence,
            valid_len,
            broken: false,
        })
    }

    /// Returns the path to the log file.
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Returns the next sequence number that will be assigned.
    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence
    }

    /// Appends a record built by `build` with the next sequence number.
    ///
    /// # Errors
    ///
    /// - `STORE_APPEND_FAILED` if the write fails; the file is cut back to
    ///   its last acknowledged length
    /// - `STORE_FSYNC_FAILED` if fsync fails (FATAL)
    /// - `STORE_CORRUPTION` if a partial record could not be cut (FATAL)
    pub fn append<F>(&mut self, build: F) -> StoreResult<u64>
    where
        F: FnOnce(u64) -> StoreRecord,
    {
        if self.broken {
            return Err(StoreError::corruption(
                "Marker log holds a partial record that could not be removed",
            ));
        }
        self.discard_unacknowledged()?;

        let sequence_number = self.next_sequence;
        let serialized = build(sequence_number).serialize();

        if let Err(e) = self.file.write_all(&serialized) {
            self.rollback();
            return Err(StoreError::append_failed(
                format!("Failed to write marker record at sequence {}", sequence_number),
                e,
            ));
        }

        if let Err(e) = self.file.sync_all() {
            self.rollback();
            return Err(StoreError::fsync_failed(
                format!("fsync failed after marker append at sequence {}", sequence_number),
                e,
            ));
        }

        self.valid_len += serialized.len() as u64;
        self.next_sequence += 1;

        Ok(sequence_number)
    }

    /// Cut anything a failed write left past the last acknowledged record.
    fn discard_unacknowledged(&mut self) -> StoreResult<()> {
        let len = file_len(&self.file, &self.log_path)?;
        if len == self.valid_len {
            return Ok(());
        }
        if len < self.valid_len {
            return Err(StoreError::corruption(format!(
                "Marker log shrank below acknowledged length: {} < {}",
                len, self.valid_len
            )));
        }

        warn!(
            path = %self.log_path.display(),
            valid_bytes = self.valid_len,
            extra_bytes = len - self.valid_len,
            "discarding unacknowledged bytes in marker log"
        );
        self.truncate_to_valid().map_err(|e| {
            self.broken = true;
            StoreError::append_failed("Failed to discard unacknowledged marker bytes", e)
        })
    }

    /// Restore the file to its acknowledged length after a failed append.
    fn rollback(&mut self) {
        if let Err(e) = self.truncate_to_valid() {
            error!(
                path = %self.log_path.display(),
                error = %e,
                "failed to roll back partial marker record, refusing further appends"
            );
            self.broken = true;
        }
    }

    fn truncate_to_valid(&self) -> io::Result<()> {
        self.file.set_len(self.valid_len)?;
        self.file.sync_all()
    }

    /// Replaces the log with `records`, renumbered from 1.
    ///
    /// The new content is written to `<log>.compact`, fsynced, renamed over
    /// the log, and the directory is fsynced. On failure the old log is left
    /// in place.
    pub fn rewrite(&mut self, records: Vec<StoreRecord>) -> StoreResult<()> {
        let tmp_path = self.log_path.with_extension("log.compact");
        let dir = self.log_path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| {
                StoreError::append_failed(
                    format!("Failed to create compaction file: {}", tmp_path.display()),
                    e,
                )
            })?;

        let mut sequence = 0u64;
        for mut record in records {
            sequence += 1;
            record.sequence_number = sequence;
            tmp.write_all(&record.serialize()).map_err(|e| {
                StoreError::append_failed(
                    format!("Failed to write compaction file: {}", tmp_path.display()),
                    e,
                )
            })?;
        }

        tmp.sync_all().map_err(|e| {
            StoreError::fsync_failed(
                format!("Failed to fsync compaction file: {}", tmp_path.display()),
                e,
            )
        })?;
        drop(tmp);

        fs::rename(&tmp_path, &self.log_path).map_err(|e| {
            StoreError::append_failed(
                format!("Failed to replace marker log: {}", self.log_path.display()),
                e,
            )
        })?;

        sync_dir(&dir)?;

        self.file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                StoreError::append_failed(
                    format!("Failed to reopen marker log: {}", self.log_path.display()),
                    e,
                )
            })?;
        self.valid_len = file_len(&self.file, &self.log_path)?;
        self.next_sequence = sequence + 1;
        self.broken = false;

        Ok(())
    }
}

fn file_len(file: &File, log_path: &Path) -> StoreResult<u64> {
    file.metadata().map(|m| m.len()).map_err(|e| {
        StoreError::append_failed(
            format!("Failed to read marker log length: {}", log_path.display()),
            e,
        )
    })
}

/// Cut the log at `len` bytes and fsync, dropping a torn final record.
pub(crate) fn truncate_log(log_path: &Path, len: u64) -> StoreResult<()> {
    let file = OpenOptions::new().write(true).open(log_path).map_err(|e| {
        StoreError::append_failed(
            format!("Failed to open marker log for truncation: {}", log_path.display()),
            e,
        )
    })?;

    file.set_len(len).map_err(|e| {
        StoreError::append_failed(
            format!("Failed to truncate marker log: {}", log_path.display()),
            e,
        )
    })?;

    file.sync_all()
        .map_err(|e| StoreError::fsync_failed("fsync failed after marker log truncation", e))
}

fn sync_dir(dir: &Path) -> StoreResult<()> {
    let handle = File::open(dir).map_err(|e| {
        StoreError::append_failed(
            format!("Failed to open marker directory for fsync: {}", dir.display()),
            e,
        )
    })?;

    handle.sync_all().map_err(|e| {
        StoreError::fsync_failed(
            format!("Failed to fsync marker directory: {}", dir.display()),
            e,
        )
    })
}
