//! Log-backed marker store
//!
//! Startup sequence:
//!
//! 1. Create `<dir>/markers/` if missing
//! 2. Replay `markers.log` from byte 0 into the in-memory map
//! 3. Drop a torn final record, if the last append never completed
//! 4. Compact the log when it holds more records than live markers
//! 5. Open the writer for appends
//!
//! Any corruption in a complete record aborts the open.
//!
//! Mutations are appended and fsynced before the map changes, so the map
//! never shows a marker that a crash could lose.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::marker::{MarkerKey, MarkerValue};

use super::errors::{StoreError, StoreResult};
use super::reader::StoreLogReader;
use super::record::{RecordType, StoreRecord};
use super::writer::{truncate_log, StoreLogWriter};
use super::MarkerStore;

/// What happened while opening the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpenStats {
    /// Records read from the log
    pub records_replayed: u64,
    /// Markers live after replay
    pub live_markers: usize,
    /// Whether an incomplete final record was dropped
    pub torn_tail: bool,
    /// Whether the log was rewritten
    pub compacted: bool,
}

struct Inner {
    markers: HashMap<MarkerKey, MarkerValue>,
    /// `None` once closed
    writer: Option<StoreLogWriter>,
}

/// Durable marker store backed by an fsynced append-only log.
pub struct WalMarkerStore {
    log_path: PathBuf,
    inner: Mutex<Inner>,
    open_stats: OpenStats,
}

impl WalMarkerStore {
    /// Opens or creates the store under `data_dir`.
    ///
    /// # Errors
    ///
    /// `STORE_CORRUPTION` if the log fails validation; I/O errors while
    /// creating, truncating or compacting the log.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let dir = data_dir.join("markers");
        let log_path = dir.join("markers.log");

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                StoreError::append_failed(
                    format!("Failed to create marker directory: {}", dir.display()),
                    e,
                )
            })?;
        }

        let mut stats = OpenStats::default();
        let mut markers = HashMap::new();
        let mut next_sequence = 1;

        if log_path.exists() {
            let mut reader = StoreLogReader::open(&log_path)?;
            while let Some(record) = reader.read_next()? {
                stats.records_replayed += 1;
                apply(&mut markers, record);
            }
            next_sequence = reader.last_sequence_number() + 1;

            if reader.has_torn_tail() {
                warn!(
                    path = %log_path.display(),
                    valid_bytes = reader.current_offset(),
                    "dropping incomplete final marker record"
                );
                truncate_log(&log_path, reader.current_offset())?;
                stats.torn_tail = true;
            }
        }

        let mut writer = StoreLogWriter::open(&log_path, next_sequence)?;

        if stats.records_replayed > markers.len() as u64 {
            writer.rewrite(live_records(&markers))?;
            stats.compacted = true;
        }

        stats.live_markers = markers.len();
        info!(
            path = %log_path.display(),
            records = stats.records_replayed,
            live = stats.live_markers,
            compacted = stats.compacted,
            "marker store opened"
        );

        Ok(Self {
            log_path,
            inner: Mutex::new(Inner {
                markers,
                writer: Some(writer),
            }),
            open_stats: stats,
        })
    }

    /// Path of the backing log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Statistics from the open that created this handle
    pub fn open_stats(&self) -> &OpenStats {
        &self.open_stats
    }

    /// Number of live markers
    pub fn len(&self) -> usize {
        self.lock().markers.len()
    }

    /// Returns true if no markers are live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the log so it contains one PUT per live marker.
    pub fn compact(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        let records = live_records(&inner.markers);
        let writer = inner.writer.as_mut().ok_or_else(StoreError::closed)?;
        writer.rewrite(records)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply(markers: &mut HashMap<MarkerKey, MarkerValue>, record: StoreRecord) {
    match (record.record_type, record.value) {
        (RecordType::Put, Some(value)) => {
            markers.insert(record.key, value);
        }
        _ => {
            markers.remove(&record.key);
        }
    }
}

fn live_records(markers: &HashMap<MarkerKey, MarkerValue>) -> Vec<StoreRecord> {
    let mut entries: Vec<_> = markers.iter().collect();
    entries.sort_by_key(|(key, _)| **key);
    entries
        .into_iter()
        .map(|(key, value)| StoreRecord::put(0, *key, *value))
        .collect()
}

impl MarkerStore for WalMarkerStore {
    fn get(&self, key: &MarkerKey) -> StoreResult<Option<MarkerValue>> {
        let inner = self.lock();
        if inner.writer.is_none() {
            return Err(StoreError::closed());
        }
        Ok(inner.markers.get(key).copied())
    }

    fn put(&self, key: MarkerKey, value: MarkerValue) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.markers.get(&key) == Some(&value) {
            return match inner.writer {
                Some(_) => Ok(()),
                None => Err(StoreError::closed()),
            };
        }

        let writer = inner.writer.as_mut().ok_or_else(StoreError::closed)?;
        writer.append(|seq| StoreRecord::put(seq, key, value))?;
        inner.markers.insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &MarkerKey) -> StoreResult<()> {
        let mut inner = self.lock();
        let present = inner.markers.contains_key(key);
        let writer = inner.writer.as_mut().ok_or_else(StoreError::closed)?;
        if !present {
            return Ok(());
        }

        writer.append(|seq| StoreRecord::delete(seq, *key))?;
        inner.markers.remove(key);
        Ok(())
    }

    fn iter_all(&self) -> StoreResult<Vec<(MarkerKey, MarkerValue)>> {
        let inner = self.lock();
        if inner.writer.is_none() {
            return Err(StoreError::closed());
        }
        Ok(inner.markers.iter().map(|(k, v)| (*k, *v)).collect())
    }

    fn close(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.writer = None;
        Ok(())
    }
}
