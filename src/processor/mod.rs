//! Marker record handler
//!
//! The host feeds every record of the marker log to
//! [`RedeliveryProcessor::process`], one at a time and in log order.
//!
//! # Lifecycle
//!
//! 1. `init`: take the store from the host context, re-queue every pending
//!    marker found there, start the redelivery task
//! 2. `process`: apply Start/Complete markers, then commit
//! 3. `close`: stop the redelivery task, wait for it, close the store
//!
//! A store failure in `process` is returned before the commit so the host
//! replays the record; both marker kinds are idempotent.

mod context;
mod errors;

pub use context::{ProcessorContext, StandaloneContext};
pub use errors::{ProcessorError, ProcessorResult};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::RedeliveryConfig;
use crate::marker::{decode_key, decode_value, MarkerKey, MarkerValue, StartMarker};
use crate::observability::RedeliveryMetrics;
use crate::queue::{LivenessCheck, MarkersQueue};
use crate::redelivery::{RedeliveryExecutor, RedeliveryHandle};
use crate::store::MarkerStore;
use crate::transport::{RecordFetcher, RecordPublisher};

/// Outcome of startup recovery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Start markers re-queued
    pub restored: usize,
    /// Store entries ignored because they were not Start markers
    pub skipped: usize,
}

struct Running {
    context: Arc<dyn ProcessorContext>,
    store: Arc<dyn MarkerStore>,
    queue: Arc<MarkersQueue>,
    handle: RedeliveryHandle,
}

enum State {
    Created,
    Running(Running),
    Closed,
}

/// Tracks Start/Complete markers and redelivers messages whose
/// processing never completed within the visibility timeout.
pub struct RedeliveryProcessor {
    config: RedeliveryConfig,
    fetcher: Arc<dyn RecordFetcher>,
    publisher: Arc<dyn RecordPublisher>,
    clock: Arc<dyn Clock>,
    metrics: Arc<RedeliveryMetrics>,
    state: State,
}

impl RedeliveryProcessor {
    /// Create a processor that fetches originals with `fetcher` and
    /// republishes them with `publisher`.
    pub fn new(
        config: RedeliveryConfig,
        fetcher: Arc<dyn RecordFetcher>,
        publisher: Arc<dyn RecordPublisher>,
    ) -> Self {
        Self {
            config,
            fetcher,
            publisher,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(RedeliveryMetrics::new()),
            state: State::Created,
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Counters shared with the redelivery task
    pub fn metrics(&self) -> &Arc<RedeliveryMetrics> {
        &self.metrics
    }

    /// Settings the processor was created with
    pub fn config(&self) -> &RedeliveryConfig {
        &self.config
    }

    /// Queued entries, stale ones included; zero unless running
    pub fn pending(&self) -> usize {
        match &self.state {
            State::Running(running) => running.queue.len(),
            _ => 0,
        }
    }

    /// Recover pending markers and start the redelivery task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read. The processor stays
    /// uninitialized in that case and the store is left open.
    pub fn init(&mut self, context: Arc<dyn ProcessorContext>) -> ProcessorResult<RecoveryStats> {
        match self.state {
            State::Created => {}
            State::Running(_) => return Err(ProcessorError::AlreadyInitialized),
            State::Closed => return Err(ProcessorError::Closed),
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ProcessorError::NoRuntime);
        }

        let store = context.marker_store();
        let queue = Arc::new(MarkersQueue::new(
            liveness_check(Arc::clone(&store)),
            Arc::clone(&self.clock),
            self.config.message_timeout(),
        ));

        let stats = recover(store.as_ref(), &queue)?;
        self.metrics.add_restored(stats.restored as u64);

        let executor = Arc::new(RedeliveryExecutor::new(
            self.config.data_topic.clone(),
            Arc::clone(&queue),
            Arc::clone(&store),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.publisher),
            Arc::clone(&self.clock),
            Arc::clone(&self.metrics),
        ));
        let handle = executor.schedule(self.config.poll_interval());

        info!(
            topic = %self.config.data_topic,
            timeout_ms = self.config.message_timeout_ms,
            restored = stats.restored,
            skipped = stats.skipped,
            "redelivery processor initialized"
        );

        self.state = State::Running(Running {
            context,
            store,
            queue,
            handle,
        });

        Ok(stats)
    }

    /// Apply one marker record, then commit it.
    pub fn process(&self, key: MarkerKey, value: MarkerValue) -> ProcessorResult<()> {
        let running = match &self.state {
            State::Running(running) => running,
            State::Created => return Err(ProcessorError::NotInitialized),
            State::Closed => return Err(ProcessorError::Closed),
        };

        match value {
            MarkerValue::Start(start) => {
                running.store.put(key, value)?;
                running.queue.offer(key, start);
                self.metrics.increment_started();
                debug!(marker = %key, message = %start.message, "start marker");
            }
            MarkerValue::Complete => {
                running.store.delete(&key)?;
                self.metrics.increment_completed();
                debug!(marker = %key, "complete marker");
            }
        }

        running.context.commit()
    }

    /// Decode a marker record in its binary form and apply it.
    pub fn process_encoded(&self, mut key: &[u8], mut value: &[u8]) -> ProcessorResult<()> {
        let key = decode_key(&mut key).map_err(|e| ProcessorError::Decode(e.to_string()))?;
        let value = decode_value(&mut value).map_err(|e| ProcessorError::Decode(e.to_string()))?;
        self.process(key, value)
    }

    /// Stop redelivery and release the store.
    ///
    /// Returns once the redelivery task has exited; the store is closed
    /// only after that. Closing again is a no-op.
    pub async fn close(&mut self) -> ProcessorResult<()> {
        let running = match std::mem::replace(&mut self.state, State::Closed) {
            State::Running(running) => running,
            State::Created | State::Closed => return Ok(()),
        };

        let stopped = running.handle.close().await;
        let closed = running.store.close();

        info!(
            topic = %self.config.data_topic,
            pending = running.queue.len(),
            "redelivery processor closed"
        );

        stopped?;
        closed?;
        Ok(())
    }
}

/// A marker is live while the store still holds its Start entry. Store
/// errors count as live so the entry is retried rather than dropped.
fn liveness_check(store: Arc<dyn MarkerStore>) -> LivenessCheck {
    Arc::new(move |key: &MarkerKey| match store.get(key) {
        Ok(Some(value)) => value.is_start(),
        Ok(None) => false,
        Err(e) => {
            warn!(marker = %key, error = %e, "liveness check failed, keeping marker");
            true
        }
    })
}

fn recover(store: &dyn MarkerStore, queue: &MarkersQueue) -> ProcessorResult<RecoveryStats> {
    let mut starts: Vec<(MarkerKey, StartMarker)> = Vec::new();
    let mut skipped = 0;

    for (key, value) in store.iter_all()? {
        match value {
            MarkerValue::Start(start) => starts.push((key, start)),
            MarkerValue::Complete => {
                warn!(marker = %key, "skipping non-start entry in marker store");
                skipped += 1;
            }
        }
    }

    let restored = queue.restore(starts);
    Ok(RecoveryStats { restored, skipped })
}
