//! Pending marker queue
//!
//! Tracks in-flight Start markers in arrival order together with their
//! redelivery deadline. Every entry gets the same visibility timeout, so
//! arrival order is deadline order and a FIFO is enough; a per-marker
//! timeout would need a structure ordered by deadline instead.
//!
//! The queue is not the source of truth for "is this marker pending": the
//! marker store is. Entries may go stale (completed, already redelivered,
//! duplicated) and are filtered with the liveness check when they expire.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::Clock;
use crate::marker::{MarkerKey, StartMarker};

/// Returns true while a marker still represents unresolved work.
pub type LivenessCheck = Arc<dyn Fn(&MarkerKey) -> bool + Send + Sync>;

/// An in-flight marker and the time it becomes overdue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedMarker {
    /// Marker identity
    pub key: MarkerKey,
    /// Start payload, used to find the original message
    pub start: StartMarker,
    /// Epoch milliseconds after which the marker is overdue
    pub deadline: u64,
}

/// Arrival-ordered queue of in-flight markers.
pub struct MarkersQueue {
    entries: Mutex<VecDeque<QueuedMarker>>,
    is_live: LivenessCheck,
    clock: Arc<dyn Clock>,
    timeout_ms: u64,
}

impl fmt::Debug for MarkersQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkersQueue")
            .field("len", &self.len())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl MarkersQueue {
    /// Create an empty queue.
    ///
    /// # Arguments
    ///
    /// * `is_live` - liveness check consulted for every expired entry
    /// * `clock` - time source for deadlines
    /// * `timeout` - visibility timeout shared by all markers
    pub fn new(is_live: LivenessCheck, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            is_live,
            clock,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Visibility timeout applied to every entry
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Enqueue a marker with deadline `now + timeout`.
    pub fn offer(&self, key: MarkerKey, start: StartMarker) {
        let deadline = self.clock.now_millis().saturating_add(self.timeout_ms);
        self.lock().push_back(QueuedMarker {
            key,
            start,
            deadline,
        });
    }

    /// Enqueue markers recovered from the store, keeping their original
    /// deadlines.
    ///
    /// A marker's deadline is `started_at + timeout`, capped at
    /// `now + timeout` so a producer clock running ahead cannot postpone it.
    /// Recovered entries are sorted by deadline; they are inserted before any
    /// later `offer`, whose deadlines are never earlier.
    ///
    /// Returns the number of entries added.
    pub fn restore(&self, markers: impl IntoIterator<Item = (MarkerKey, StartMarker)>) -> usize {
        let now = self.clock.now_millis();
        let mut restored: Vec<QueuedMarker> = markers
            .into_iter()
            .map(|(key, start)| QueuedMarker {
                key,
                start,
                deadline: start.started_at.min(now).saturating_add(self.timeout_ms),
            })
            .collect();
        restored.sort_by_key(|entry| entry.deadline);

        let count = restored.len();
        let mut entries = self.lock();
        let mut merged: Vec<QueuedMarker> = entries.drain(..).chain(restored).collect();
        merged.sort_by_key(|entry| entry.deadline);
        entries.extend(merged);
        count
    }

    /// Remove and return every overdue entry that is still live.
    ///
    /// Pops entries while the head's deadline is at or before `now`.
    /// Entries whose marker is no longer live are discarded. The result is
    /// in deadline order and may be empty.
    pub fn drain_overdue(&self, now: u64) -> Vec<QueuedMarker> {
        let expired: Vec<QueuedMarker> = {
            let mut entries = self.lock();
            let split = entries
                .iter()
                .position(|entry| entry.deadline > now)
                .unwrap_or(entries.len());
            entries.drain(..split).collect()
        };

        // Liveness reads the store; never hold the queue lock across it.
        expired
            .into_iter()
            .filter(|entry| (self.is_live)(&entry.key))
            .collect()
    }

    /// Deadline of the head entry
    pub fn next_deadline(&self) -> Option<u64> {
        self.lock().front().map(|entry| entry.deadline)
    }

    /// Number of queued entries, stale ones included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueuedMarker>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::marker::{MarkerValue, MessageRef};
    use crate::store::{MarkerStore, MemoryMarkerStore};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::RwLock;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_secs(30);

    struct Fixture {
        clock: Arc<ManualClock>,
        live: Arc<RwLock<HashSet<MarkerKey>>>,
        queue: MarkersQueue,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(0));
        let live = Arc::new(RwLock::new(HashSet::new()));
        let check = {
            let live = Arc::clone(&live);
            Arc::new(move |key: &MarkerKey| live.read().unwrap().contains(key)) as LivenessCheck
        };
        let queue = MarkersQueue::new(check, clock.clone(), TIMEOUT);
        Fixture { clock, live, queue }
    }

    fn start(offset: u64, started_at: u64) -> StartMarker {
        StartMarker::new(MessageRef::new(0, offset), started_at)
    }

    fn key(offset: u64) -> MarkerKey {
        MarkerKey::new(0, offset)
    }

    #[test]
    fn test_nothing_overdue_before_deadline() {
        let f = fixture();
        f.live.write().unwrap().insert(key(1));
        f.queue.offer(key(1), start(1, 0));

        assert!(f.queue.drain_overdue(29_999).is_empty());
        assert_eq!(f.queue.len(), 1);
    }

    #[test]
    fn test_overdue_at_exact_deadline() {
        let f = fixture();
        f.live.write().unwrap().insert(key(1));
        f.queue.offer(key(1), start(1, 0));

        let batch = f.queue.drain_overdue(30_000);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].deadline, 30_000);
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_resolved_entries_discarded() {
        let f = fixture();
        f.queue.offer(key(1), start(1, 0));
        f.live.write().unwrap().insert(key(2));
        f.queue.offer(key(2), start(2, 0));

        let batch = f.queue.drain_overdue(31_000);
        assert_eq!(batch.iter().map(|e| e.key).collect::<Vec<_>>(), vec![key(2)]);
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_stops_at_first_future_deadline() {
        let f = fixture();
        for offset in 0..3 {
            f.live.write().unwrap().insert(key(offset));
            f.queue.offer(key(offset), start(offset, 0));
            f.clock.advance(Duration::from_secs(10));
        }

        // Deadlines: 30s, 40s, 50s
        let batch = f.queue.drain_overdue(45_000);
        assert_eq!(batch.len(), 2);
        assert_eq!(f.queue.next_deadline(), Some(50_000));
    }

    #[test]
    fn test_duplicate_offer_yields_one_live_entry() {
        let f = fixture();
        f.live.write().unwrap().insert(key(1));
        f.queue.offer(key(1), start(1, 0));
        f.clock.advance(Duration::from_secs(1));
        f.queue.offer(key(1), start(1, 0));

        let first = f.queue.drain_overdue(30_000);
        assert_eq!(first.len(), 1);

        // Redelivery retires the marker before the duplicate expires
        f.live.write().unwrap().remove(&key(1));

        assert!(f.queue.drain_overdue(31_000).is_empty());
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_earlier_offer_has_earlier_deadline() {
        let f = fixture();
        f.queue.offer(key(1), start(1, 0));
        f.clock.advance(Duration::from_millis(1));
        f.queue.offer(key(2), start(2, 0));

        let entries: Vec<u64> = f.queue.lock().iter().map(|e| e.deadline).collect();
        assert!(entries[0] < entries[1]);
    }

    #[test]
    fn test_restore_keeps_original_deadlines() {
        let f = fixture();
        f.clock.set(100_000);
        for offset in [1, 2, 3] {
            f.live.write().unwrap().insert(key(offset));
        }

        let restored = f.queue.restore(vec![
            (key(1), start(1, 90_000)),
            (key(2), start(2, 60_000)),
            (key(3), start(3, 500_000)),
        ]);
        assert_eq!(restored, 3);

        // 60s + 30s is already overdue at restart
        let batch = f.queue.drain_overdue(100_000);
        assert_eq!(batch.iter().map(|e| e.key).collect::<Vec<_>>(), vec![key(2)]);

        // Future-stamped marker is capped at now + timeout
        let batch = f.queue.drain_overdue(130_000);
        assert_eq!(batch.iter().map(|e| e.key).collect::<Vec<_>>(), vec![key(1), key(3)]);
        assert_eq!(batch[0].deadline, 120_000);
        assert_eq!(batch[1].deadline, 130_000);
    }

    #[test]
    fn test_concurrent_offer_drain_with_store_writes() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryMarkerStore::new());
        let check: LivenessCheck = {
            let store = Arc::clone(&store);
            Arc::new(move |key: &MarkerKey| matches!(store.get(key), Ok(Some(_))))
        };
        let queue = Arc::new(MarkersQueue::new(check, clock, TIMEOUT));
        let done = Arc::new(AtomicBool::new(false));

        let drainer = {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut drained = Vec::new();
                while !done.load(Ordering::SeqCst) {
                    drained.extend(queue.drain_overdue(u64::MAX).into_iter().map(|e| e.key));
                    thread::yield_now();
                }
                drained
            })
        };

        let mut writers = Vec::new();
        for partition in 0..4u32 {
            let queue = Arc::clone(&queue);
            let store = Arc::clone(&store);
            writers.push(thread::spawn(move || {
                for offset in 0..250u64 {
                    let start = StartMarker::new(MessageRef::new(partition, offset), 0);
                    let key = MarkerKey::from(start.message);
                    store.put(key, MarkerValue::Start(start)).unwrap();
                    queue.offer(key, start);
                    // Odd offsets complete while the drainer runs
                    if offset % 2 == 1 {
                        store.delete(&key).unwrap();
                    }
                }
            }));
        }
        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);

        let mut drained = drainer.join().unwrap();
        drained.extend(queue.drain_overdue(u64::MAX).into_iter().map(|e| e.key));
        assert!(queue.is_empty());

        let mut seen: HashMap<MarkerKey, usize> = HashMap::new();
        for key in &drained {
            *seen.entry(*key).or_default() += 1;
        }
        assert!(seen.values().all(|&count| count == 1));
        for partition in 0..4u32 {
            for offset in (0..250u64).step_by(2) {
                assert_eq!(seen.get(&MarkerKey::new(partition, offset)), Some(&1));
            }
        }
        assert_eq!(store.len(), 500);
    }
}
