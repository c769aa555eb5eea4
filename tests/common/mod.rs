//! Shared harness for processor-level tests
//!
//! Runs a real `RedeliveryProcessor` with a short poll interval over a
//! `MemoryLog`, driven by a `ManualClock`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use redeliver::clock::{Clock, ManualClock};
use redeliver::config::RedeliveryConfig;
use redeliver::marker::{MarkerKey, MarkerValue, MessageRef};
use redeliver::processor::{RedeliveryProcessor, StandaloneContext};
use redeliver::store::MarkerStore;
use redeliver::transport::{
    LogRecord, MemoryLog, PublishAck, RecordFetcher, RecordPublisher, TransportError,
    TransportResult,
};

pub const TOPIC: &str = "data";
pub const TIMEOUT: Duration = Duration::from_secs(30);
pub const POLL: Duration = Duration::from_millis(5);

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub log: Arc<MemoryLog>,
    pub store: Arc<dyn MarkerStore>,
    pub context: Arc<StandaloneContext>,
    pub processor: RedeliveryProcessor,
}

impl Harness {
    /// Processor over `store` with the log as both fetcher and publisher
    pub fn start(store: Arc<dyn MarkerStore>, now: u64) -> Self {
        let log = Arc::new(MemoryLog::new());
        log.create_topic(TOPIC, 1);
        Self::start_with(store, now, log.clone(), log.clone(), log)
    }

    pub fn start_with(
        store: Arc<dyn MarkerStore>,
        now: u64,
        log: Arc<MemoryLog>,
        fetcher: Arc<dyn RecordFetcher>,
        publisher: Arc<dyn RecordPublisher>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(now));
        let config = RedeliveryConfig::new(TOPIC)
            .with_message_timeout(TIMEOUT)
            .with_poll_interval(POLL);
        let mut processor =
            RedeliveryProcessor::new(config, fetcher, publisher).with_clock(clock.clone());
        let context = Arc::new(StandaloneContext::new(Arc::clone(&store)));
        processor.init(context.clone()).expect("init");

        Self {
            clock,
            log,
            store,
            context,
            processor,
        }
    }

    /// Append an original message to the data log
    pub fn produce(&self, body: &str) -> MessageRef {
        let record = LogRecord::new(Some(body.as_bytes().to_vec()), Some(body.as_bytes().to_vec()));
        self.log.append_to(TOPIC, 0, record).expect("append")
    }

    pub fn start_marker(&self, message: MessageRef) -> MarkerKey {
        let key = MarkerKey::from(message);
        self.processor
            .process(key, MarkerValue::start(message, self.clock.now_millis()))
            .expect("start");
        key
    }

    pub fn complete_marker(&self, key: MarkerKey) {
        self.processor
            .process(key, MarkerValue::Complete)
            .expect("complete");
    }

    /// Move the clock to an absolute time in seconds
    pub fn at_secs(&self, secs: u64) {
        self.clock.set(secs * 1_000);
    }

    pub fn redelivered(&self) -> u64 {
        self.processor.metrics().snapshot().redelivered
    }

    /// Copies in the data log, originals excluded
    pub fn copies(&self, originals: u64) -> u64 {
        self.log.appended(TOPIC) - originals
    }

    /// Wait until the scheduler has run `n` more complete ticks
    pub async fn settle(&self, n: u64) {
        let target = self.processor.metrics().snapshot().ticks + n + 1;
        wait_until(|| self.processor.metrics().snapshot().ticks >= target).await;
    }
}

/// Poll `condition` until it holds, failing after two seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..2_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}

/// Publisher that fails a fixed number of times before delegating
pub struct FlakyPublisher {
    inner: Arc<MemoryLog>,
    failures_left: AtomicUsize,
}

impl FlakyPublisher {
    pub fn new(inner: Arc<MemoryLog>, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
        }
    }

    pub fn failures_left(&self) -> usize {
        self.failures_left.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordPublisher for FlakyPublisher {
    async fn publish(&self, topic: &str, record: LogRecord) -> TransportResult<PublishAck> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(TransportError::Timeout(500));
        }
        self.inner.publish(topic, record).await
    }
}

/// Publisher that holds every publish for `delay` before delegating
pub struct SlowPublisher {
    inner: Arc<MemoryLog>,
    delay: Duration,
    entered: AtomicBool,
}

impl SlowPublisher {
    pub fn new(inner: Arc<MemoryLog>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            entered: AtomicBool::new(false),
        }
    }

    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordPublisher for SlowPublisher {
    async fn publish(&self, topic: &str, record: LogRecord) -> TransportResult<PublishAck> {
        self.entered.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.publish(topic, record).await
    }
}
