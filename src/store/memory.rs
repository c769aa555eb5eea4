//! Volatile marker store

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::marker::{MarkerKey, MarkerValue};

use super::errors::{StoreError, StoreResult};
use super::MarkerStore;

/// Marker store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    markers: RwLock<HashMap<MarkerKey, MarkerValue>>,
    closed: AtomicBool,
}

impl MemoryMarkerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries(entries: impl IntoIterator<Item = (MarkerKey, MarkerValue)>) -> Self {
        Self {
            markers: RwLock::new(entries.into_iter().collect()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of stored markers
    pub fn len(&self) -> usize {
        self.markers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(StoreError::closed())
        } else {
            Ok(())
        }
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn get(&self, key: &MarkerKey) -> StoreResult<Option<MarkerValue>> {
        self.ensure_open()?;
        let markers = self.markers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(markers.get(key).copied())
    }

    fn put(&self, key: MarkerKey, value: MarkerValue) -> StoreResult<()> {
        self.ensure_open()?;
        let mut markers = self.markers.write().unwrap_or_else(PoisonError::into_inner);
        markers.insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &MarkerKey) -> StoreResult<()> {
        self.ensure_open()?;
        let mut markers = self.markers.write().unwrap_or_else(PoisonError::into_inner);
        markers.remove(key);
        Ok(())
    }

    fn iter_all(&self) -> StoreResult<Vec<(MarkerKey, MarkerValue)>> {
        self.ensure_open()?;
        let markers = self.markers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(markers.iter().map(|(k, v)| (*k, *v)).collect())
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
