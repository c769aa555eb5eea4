//! In-memory partitioned log
//!
//! A reference data log with the properties redelivery depends on:
//! per-partition offsets that only grow, point reads by offset, and
//! retention that removes old offsets.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::marker::MessageRef;

use super::errors::{TransportError, TransportResult};
use super::{LogRecord, PublishAck, RecordFetcher, RecordPublisher};

#[derive(Debug, Default)]
struct Partition {
    /// Offset of `records[0]`
    start_offset: u64,
    records: VecDeque<LogRecord>,
}

impl Partition {
    fn end_offset(&self) -> u64 {
        self.start_offset + self.records.len() as u64
    }

    fn append(&mut self, record: LogRecord) -> u64 {
        let offset = self.end_offset();
        self.records.push_back(record);
        offset
    }

    fn get(&self, offset: u64) -> Option<&LogRecord> {
        if offset < self.start_offset {
            return None;
        }
        self.records.get((offset - self.start_offset) as usize)
    }
}

/// Partitioned append-only log held in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    topics: RwLock<HashMap<String, Vec<Partition>>>,
    round_robin: AtomicU32,
}

impl MemoryLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `topic` with `partitions` empty partitions (at least one).
    pub fn create_topic(&self, topic: &str, partitions: u32) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| (0..partitions.max(1)).map(|_| Partition::default()).collect());
    }

    /// Append `record` to a specific partition, returning its location.
    pub fn append_to(
        &self,
        topic: &str,
        partition: u32,
        record: LogRecord,
    ) -> TransportResult<MessageRef> {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let partitions = topics
            .get_mut(topic)
            .ok_or_else(|| TransportError::UnknownTopic(topic.to_string()))?;
        let target = partitions
            .get_mut(partition as usize)
            .ok_or_else(|| TransportError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })?;
        Ok(MessageRef::new(partition, target.append(record)))
    }

    /// Drop every record below `offset` in a partition, as retention would.
    pub fn expire_before(&self, topic: &str, partition: u32, offset: u64) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(target) = topics
            .get_mut(topic)
            .and_then(|partitions| partitions.get_mut(partition as usize))
        {
            while target.start_offset < offset && !target.records.is_empty() {
                target.records.pop_front();
                target.start_offset += 1;
            }
            target.start_offset = target.start_offset.max(offset);
        }
    }

    /// Records currently readable in a partition, with their offsets
    pub fn records(&self, topic: &str, partition: u32) -> Vec<(u64, LogRecord)> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(topic)
            .and_then(|partitions| partitions.get(partition as usize))
            .map(|p| {
                p.records
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (p.start_offset + i as u64, r.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of records ever appended to `topic`
    pub fn appended(&self, topic: &str) -> u64 {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(topic)
            .map(|partitions| partitions.iter().map(Partition::end_offset).sum())
            .unwrap_or(0)
    }

    fn choose_partition(&self, key: Option<&[u8]>, partitions: u32) -> u32 {
        match key {
            Some(key) => crc32fast::hash(key) % partitions,
            None => self.round_robin.fetch_add(1, Ordering::Relaxed) % partitions,
        }
    }
}

#[async_trait]
impl RecordFetcher for MemoryLog {
    async fn fetch(&self, topic: &str, message: MessageRef) -> TransportResult<Option<LogRecord>> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let partitions = topics
            .get(topic)
            .ok_or_else(|| TransportError::UnknownTopic(topic.to_string()))?;
        let partition = partitions
            .get(message.partition as usize)
            .ok_or_else(|| TransportError::UnknownPartition {
                topic: topic.to_string(),
                partition: message.partition,
            })?;
        Ok(partition.get(message.offset).cloned())
    }
}

#[async_trait]
impl RecordPublisher for MemoryLog {
    async fn publish(&self, topic: &str, record: LogRecord) -> TransportResult<PublishAck> {
        let count = {
            let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
            topics
                .get(topic)
                .map(|partitions| partitions.len() as u32)
                .ok_or_else(|| TransportError::UnknownTopic(topic.to_string()))?
        };
        let partition = self.choose_partition(record.key.as_deref(), count);
        let message = self.append_to(topic, partition, record)?;
        Ok(PublishAck {
            partition: message.partition,
            offset: message.offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Header;

    fn record(key: &str) -> LogRecord {
        LogRecord::new(Some(key.as_bytes().to_vec()), Some(b"body".to_vec()))
            .with_header(Header::new("trace", "abc"))
    }

    #[tokio::test]
    async fn test_append_then_fetch() {
        let log = MemoryLog::new();
        log.create_topic("data", 2);

        let at = log.append_to("data", 1, record("k1")).unwrap();
        assert_eq!(at, MessageRef::new(1, 0));

        let fetched = log.fetch("data", at).await.unwrap();
        assert_eq!(fetched, Some(record("k1")));
        assert_eq!(log.fetch("data", MessageRef::new(1, 5)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_offsets_are_gone() {
        let log = MemoryLog::new();
        log.create_topic("data", 1);
        for i in 0..3 {
            log.append_to("data", 0, record(&format!("k{}", i))).unwrap();
        }

        log.expire_before("data", 0, 2);

        assert_eq!(log.fetch("data", MessageRef::new(0, 1)).await.unwrap(), None);
        assert!(log.fetch("data", MessageRef::new(0, 2)).await.unwrap().is_some());
        assert_eq!(log.append_to("data", 0, record("k3")).unwrap().offset, 3);
    }

    #[tokio::test]
    async fn test_keyed_publish_is_sticky() {
        let log = MemoryLog::new();
        log.create_topic("data", 4);

        let a = log.publish("data", record("same")).await.unwrap();
        let b = log.publish("data", record("same")).await.unwrap();

        assert_eq!(a.partition, b.partition);
        assert_eq!(b.offset, a.offset + 1);
        assert_eq!(log.appended("data"), 2);
    }

    #[tokio::test]
    async fn test_unknown_topic() {
        let log = MemoryLog::new();
        let err = log.publish("missing", record("k")).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownTopic(_)));
    }
}
