//! Durable marker store
//!
//! Holds exactly the markers that are in flight: a Start entry exists from
//! the moment its Start marker is applied until it is either completed or
//! retired by redelivery. Complete markers are never stored.
//!
//! The store is shared by the ingestion path and the redelivery task, so
//! every implementation guards its state internally and all methods take
//! `&self`.
//!
//! # Implementations
//!
//! - [`WalMarkerStore`]: in-memory map backed by a checksummed, fsynced
//!   append-only log; survives crash-restart
//! - [`MemoryMarkerStore`]: volatile map, for hosts that provide their own
//!   durability and for tests

mod checksum;
mod durable;
mod errors;
mod memory;
mod reader;
mod record;
mod writer;

pub use checksum::compute_checksum;
pub use durable::{OpenStats, WalMarkerStore};
pub use errors::{Severity, StoreError, StoreErrorCode, StoreResult};
pub use memory::MemoryMarkerStore;
pub use reader::StoreLogReader;
pub use record::{RecordType, StoreRecord};
pub use writer::StoreLogWriter;

use crate::marker::{MarkerKey, MarkerValue};

/// Keyed map of in-flight markers.
pub trait MarkerStore: Send + Sync {
    /// Current value for `key`, if any
    fn get(&self, key: &MarkerKey) -> StoreResult<Option<MarkerValue>>;

    /// Store `value` under `key`, replacing any previous value
    fn put(&self, key: MarkerKey, value: MarkerValue) -> StoreResult<()>;

    /// Remove `key`; removing an absent key succeeds
    fn delete(&self, key: &MarkerKey) -> StoreResult<()>;

    /// Snapshot of every entry, in no particular order
    fn iter_all(&self) -> StoreResult<Vec<(MarkerKey, MarkerValue)>>;

    /// Release the store; later operations fail with `STORE_CLOSED`
    fn close(&self) -> StoreResult<()>;
}
