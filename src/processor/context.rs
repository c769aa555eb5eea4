//! Host services for the marker processor
//!
//! [`StandaloneContext`] runs the processor without a stream host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::store::MarkerStore;

use super::errors::ProcessorResult;

/// Services the host hands to the processor.
pub trait ProcessorContext: Send + Sync {
    /// The store shared with the redelivery task
    fn marker_store(&self) -> Arc<dyn MarkerStore>;

    /// Acknowledge the record just processed
    fn commit(&self) -> ProcessorResult<()>;
}

/// Context for running the processor outside a stream host.
///
/// Commits only bump a counter.
pub struct StandaloneContext {
    store: Arc<dyn MarkerStore>,
    commits: AtomicU64,
}

impl StandaloneContext {
    /// Create a context over `store` with no commits recorded
    pub fn new(store: Arc<dyn MarkerStore>) -> Self {
        Self {
            store,
            commits: AtomicU64::new(0),
        }
    }

    /// Number of commits so far
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

impl ProcessorContext for StandaloneContext {
    fn marker_store(&self) -> Arc<dyn MarkerStore> {
        Arc::clone(&self.store)
    }

    fn commit(&self) -> ProcessorResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
