//! Redelivery metrics
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by the ingestion path and the redelivery task.
///
/// All counters use Relaxed ordering; exact cross-counter consistency is
/// not needed.
#[derive(Debug, Default)]
pub struct RedeliveryMetrics {
    markers_started: AtomicU64,
    markers_completed: AtomicU64,
    markers_restored: AtomicU64,
    redelivered: AtomicU64,
    poisoned: AtomicU64,
    failed: AtomicU64,
    requeued: AtomicU64,
    ticks: AtomicU64,
}

/// Point-in-time copy of [`RedeliveryMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Start markers applied
    pub markers_started: u64,
    /// Complete markers applied
    pub markers_completed: u64,
    /// Markers re-queued from the store at startup
    pub markers_restored: u64,
    /// Messages republished
    pub redelivered: u64,
    /// Markers retired because the original was gone
    pub poisoned: u64,
    /// Markers retired after a permanent transport error
    pub failed: u64,
    /// Markers put back after a failed attempt
    pub requeued: u64,
    /// Redelivery ticks run
    pub ticks: u64,
}

impl RedeliveryMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an applied Start marker
    pub fn increment_started(&self) {
        self.markers_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an applied Complete marker
    pub fn increment_completed(&self) {
        self.markers_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count markers restored at startup
    pub fn add_restored(&self, count: u64) {
        self.markers_restored.fetch_add(count, Ordering::Relaxed);
    }

    /// Count a republished message
    pub fn increment_redelivered(&self) {
        self.redelivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a poison marker
    pub fn increment_poisoned(&self) {
        self.poisoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a marker retired after a permanent transport error
    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a re-queued marker
    pub fn increment_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a redelivery tick
    pub fn increment_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            markers_started: self.markers_started.load(Ordering::Relaxed),
            markers_completed: self.markers_completed.load(Ordering::Relaxed),
            markers_restored: self.markers_restored.load(Ordering::Relaxed),
            redelivered: self.redelivered.load(Ordering::Relaxed),
            poisoned: self.poisoned.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(RedeliveryMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(RedeliveryMetrics::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let metrics = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..250 {
                    metrics.increment_redelivered();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().redelivered, 1000);
    }
}
