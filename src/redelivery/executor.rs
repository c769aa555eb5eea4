//! Redelivery executor and its periodic task

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::observability::RedeliveryMetrics;
use crate::queue::{MarkersQueue, QueuedMarker};
use crate::store::MarkerStore;
use crate::transport::{RecordFetcher, RecordPublisher};

use super::errors::{RedeliveryError, RedeliveryResult};

/// Outcome counts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Messages republished and markers retired
    pub redelivered: usize,
    /// Markers retired because the original was gone
    pub poisoned: usize,
    /// Markers retired after a permanent transport error
    pub failed: usize,
    /// Markers put back for a later attempt
    pub requeued: usize,
}

impl TickReport {
    /// Returns true if the tick touched no marker
    pub fn is_empty(&self) -> bool {
        self.redelivered == 0 && self.poisoned == 0 && self.failed == 0 && self.requeued == 0
    }
}

enum Outcome {
    Redelivered,
    Poisoned,
    Failed,
    Requeued,
}

/// Performs redelivery of overdue markers.
pub struct RedeliveryExecutor {
    data_topic: String,
    queue: Arc<MarkersQueue>,
    store: Arc<dyn MarkerStore>,
    fetcher: Arc<dyn RecordFetcher>,
    publisher: Arc<dyn RecordPublisher>,
    clock: Arc<dyn Clock>,
    metrics: Arc<RedeliveryMetrics>,
}

impl RedeliveryExecutor {
    /// Create an executor over shared queue and store handles
    pub fn new(
        data_topic: impl Into<String>,
        queue: Arc<MarkersQueue>,
        store: Arc<dyn MarkerStore>,
        fetcher: Arc<dyn RecordFetcher>,
        publisher: Arc<dyn RecordPublisher>,
        clock: Arc<dyn Clock>,
        metrics: Arc<RedeliveryMetrics>,
    ) -> Self {
        Self {
            data_topic: data_topic.into(),
            queue,
            store,
            fetcher,
            publisher,
            clock,
            metrics,
        }
    }

    /// Redeliver every marker that is overdue right now.
    pub async fn tick(&self) -> TickReport {
        self.metrics.increment_ticks();

        let batch = self.queue.drain_overdue(self.clock.now_millis());
        let mut report = TickReport::default();

        for entry in batch {
            match self.redeliver(&entry).await {
                Outcome::Redelivered => report.redelivered += 1,
                Outcome::Poisoned => report.poisoned += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Requeued => report.requeued += 1,
            }
        }

        report
    }

    async fn redeliver(&self, entry: &QueuedMarker) -> Outcome {
        let message = entry.start.message;

        let record = match self.fetcher.fetch(&self.data_topic, message).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(
                    marker = %entry.key,
                    message = %message,
                    topic = %self.data_topic,
                    "original message no longer in the data log, retiring poison marker"
                );
                return self.retire(entry, Outcome::Poisoned);
            }
            Err(e) if e.is_transient() => {
                warn!(
                    marker = %entry.key,
                    message = %message,
                    error = %e,
                    "failed to fetch original message, will retry"
                );
                return self.requeue(entry);
            }
            Err(e) => {
                error!(
                    marker = %entry.key,
                    message = %message,
                    topic = %self.data_topic,
                    error = %e,
                    "original message cannot be fetched, retiring marker"
                );
                return self.retire(entry, Outcome::Failed);
            }
        };

        match self.publisher.publish(&self.data_topic, record).await {
            Ok(ack) => {
                info!(
                    marker = %entry.key,
                    message = %message,
                    copy = %ack.message(),
                    "redelivered message"
                );
                self.retire(entry, Outcome::Redelivered)
            }
            Err(e) if e.is_transient() => {
                warn!(
                    marker = %entry.key,
                    message = %message,
                    error = %e,
                    "failed to republish message, will retry"
                );
                self.requeue(entry)
            }
            Err(e) => {
                error!(
                    marker = %entry.key,
                    message = %message,
                    topic = %self.data_topic,
                    error = %e,
                    "message rejected on republish, retiring marker"
                );
                self.retire(entry, Outcome::Failed)
            }
        }
    }

    /// Delete the marker and count `outcome` only once the delete succeeded.
    fn retire(&self, entry: &QueuedMarker, outcome: Outcome) -> Outcome {
        match self.store.delete(&entry.key) {
            Ok(()) => {
                match outcome {
                    Outcome::Redelivered => self.metrics.increment_redelivered(),
                    Outcome::Poisoned => self.metrics.increment_poisoned(),
                    Outcome::Failed => self.metrics.increment_failed(),
                    Outcome::Requeued => {}
                }
                outcome
            }
            Err(e) => {
                error!(marker = %entry.key, error = %e, "failed to retire marker");
                self.requeue(entry)
            }
        }
    }

    fn requeue(&self, entry: &QueuedMarker) -> Outcome {
        self.queue.offer(entry.key, entry.start);
        self.metrics.increment_requeued();
        Outcome::Requeued
    }

    /// Spawn the periodic redelivery task on the current tokio runtime.
    ///
    /// The first tick runs immediately, later ones every `interval`.
    /// Each tick runs as its own task; a tick that panics is logged and the
    /// loop goes on. Must be called from within a tokio runtime.
    pub fn schedule(self: Arc<Self>, interval: Duration) -> RedeliveryHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                interval_ms = interval.as_millis() as u64,
                topic = %self.data_topic,
                "redelivery task started"
            );

            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    // Also fires when the handle is dropped
                    _ = shutdown_rx.changed() => break,

                    _ = ticker.tick() => {
                        let executor = Arc::clone(&self);
                        match tokio::spawn(async move { executor.tick().await }).await {
                            Ok(report) if !report.is_empty() => {
                                debug!(
                                    redelivered = report.redelivered,
                                    poisoned = report.poisoned,
                                    failed = report.failed,
                                    requeued = report.requeued,
                                    "redelivery tick"
                                );
                            }
                            Ok(_) => {}
                            // Drained markers stay in the store and return on restart
                            Err(e) => error!(
                                topic = %self.data_topic,
                                error = %e,
                                "redelivery tick aborted"
                            ),
                        }
                    }
                }
            }

            info!(topic = %self.data_topic, "redelivery task stopped");
        });

        RedeliveryHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Control handle for a scheduled redelivery task.
pub struct RedeliveryHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RedeliveryHandle {
    /// Stop the task and wait for it.
    ///
    /// No tick starts after the signal; a tick already running completes
    /// before this returns.
    pub async fn close(self) -> RedeliveryResult<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| RedeliveryError::TaskFailed(e.to_string()))
    }

    /// Returns true once the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
