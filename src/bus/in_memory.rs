//! In-memory broker for testing and single-process scenarios.
//!
//! This module provides a partitioned, append-only log that implements
//! `Publisher`, `Subscribable` and `TopicAdmin`, useful for:
//! - Unit and integration testing without an external broker
//! - Single-process applications
//! - Development and prototyping

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::error::BrokerError;
use super::record::{OutboundRecord, Record, RecordMetadata};
use super::subscriber::{Subscribable, Subscriber};
use super::topic_admin::{NewTopic, TopicAdmin};
use super::Publisher;
use crate::envelope::now_millis;

type OffsetKey = (String, String, u32);

struct TopicLog {
    partitions: Vec<Vec<Record>>,
}

impl TopicLog {
    fn new(partitions: u32) -> Self {
        Self {
            partitions: (0..partitions.max(1)).map(|_| Vec::new()).collect(),
        }
    }
}

struct Inner {
    topics: RwLock<HashMap<String, TopicLog>>,
    /// Next offset to deliver, per (group, topic, partition)
    offsets: Mutex<HashMap<OffsetKey, u64>>,
    /// Highest acknowledged offset, per (group, topic, partition)
    acked: Mutex<HashMap<OffsetKey, u64>>,
    appended: Notify,
    auto_create: bool,
    default_partitions: u32,
    failures: AtomicUsize,
    round_robin: AtomicU32,
}

/// In-memory broker for testing and single-process scenarios.
///
/// Features:
/// - Cheap to clone; clones share the same log
/// - Key-hash partitioning (round robin when no key), ordered per partition
/// - Offsets tracked per consumer group
/// - Topics auto-created on first use unless disabled
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use msbus::bus::{InMemoryBroker, OutboundRecord, Publisher, Subscribable, Subscriber};
///
/// # tokio_test_block(async {
/// let broker = InMemoryBroker::new();
/// broker
///     .publish("ms.user.created", OutboundRecord::new(b"{}".to_vec()))
///     .await
///     .unwrap();
///
/// let subscriber = broker.subscriber("audit", "ms.user.created").await.unwrap();
/// let record = subscriber.poll(Duration::from_millis(10)).await.unwrap();
/// assert!(record.is_some());
/// # });
/// # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Create a broker with single-partition, auto-created topics.
    pub fn new() -> Self {
        Self::with_options(true, 1)
    }

    /// Create a broker that auto-creates topics with `partitions` partitions.
    pub fn with_partitions(partitions: u32) -> Self {
        Self::with_options(true, partitions)
    }

    /// Create a broker that rejects unknown topics.
    pub fn strict() -> Self {
        Self::with_options(false, 1)
    }

    fn with_options(auto_create: bool, default_partitions: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: RwLock::new(HashMap::new()),
                offsets: Mutex::new(HashMap::new()),
                acked: Mutex::new(HashMap::new()),
                appended: Notify::new(),
                auto_create,
                default_partitions: default_partitions.max(1),
                failures: AtomicUsize::new(0),
                round_robin: AtomicU32::new(0),
            }),
        }
    }

    /// Make the next `n` publish calls fail with `BrokerError::Unavailable`.
    pub fn fail_next_publishes(&self, n: usize) {
        self.inner.failures.store(n, Ordering::SeqCst);
    }

    /// All records of a topic, partition by partition in offset order.
    pub fn records(&self, topic: &str) -> Vec<Record> {
        match self.inner.topics.read() {
            Ok(topics) => topics
                .get(topic)
                .map(|log| log.partitions.iter().flatten().cloned().collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of records in a topic.
    pub fn len(&self, topic: &str) -> usize {
        self.records(topic).len()
    }

    /// Number of partitions of a topic, if it exists.
    pub fn partitions(&self, topic: &str) -> Option<u32> {
        self.inner
            .topics
            .read()
            .ok()?
            .get(topic)
            .map(|log| log.partitions.len() as u32)
    }

    /// Highest offset acknowledged by `group` on `topic`, as
    /// `(partition, offset)` pairs sorted by partition.
    pub fn acknowledged(&self, group: &str, topic: &str) -> Vec<(u32, u64)> {
        let Ok(acked) = self.inner.acked.lock() else {
            return Vec::new();
        };
        let mut committed: Vec<(u32, u64)> = acked
            .iter()
            .filter(|((g, t, _), _)| g == group && t == topic)
            .map(|((_, _, partition), offset)| (*partition, *offset))
            .collect();
        committed.sort_unstable();
        committed
    }

    fn ensure_topic(&self, topic: &str) -> Result<(), BrokerError> {
        if topic.is_empty() {
            return Err(BrokerError::InvalidTopic(topic.to_string()));
        }
        let mut topics = self
            .inner
            .topics
            .write()
            .map_err(|_| BrokerError::LockPoisoned("ensure_topic"))?;
        if topics.contains_key(topic) {
            return Ok(());
        }
        if !self.inner.auto_create {
            return Err(BrokerError::UnknownTopic(topic.to_string()));
        }
        topics.insert(topic.to_string(), TopicLog::new(self.inner.default_partitions));
        Ok(())
    }

    fn select_partition(&self, key: Option<&str>, partitions: usize) -> u32 {
        let slot = match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                hasher.finish() as usize
            }
            None => self.inner.round_robin.fetch_add(1, Ordering::Relaxed) as usize,
        };
        (slot % partitions.max(1)) as u32
    }

    fn append(&self, topic: &str, record: OutboundRecord) -> Result<RecordMetadata, BrokerError> {
        let metadata = {
            let mut topics = self
                .inner
                .topics
                .write()
                .map_err(|_| BrokerError::LockPoisoned("publish"))?;
            let log = topics
                .get_mut(topic)
                .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))?;
            let partition = self.select_partition(record.key.as_deref(), log.partitions.len());
            let entries = &mut log.partitions[partition as usize];
            let offset = entries.len() as u64;
            entries.push(Record {
                topic: topic.to_string(),
                partition,
                offset,
                key: record.key,
                value: record.value,
                headers: record.headers,
                timestamp: now_millis(),
            });
            RecordMetadata {
                topic: topic.to_string(),
                partition,
                offset,
            }
        };
        self.inner.appended.notify_waiters();
        Ok(metadata)
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(
        &self,
        topic: &str,
        record: OutboundRecord,
    ) -> Result<RecordMetadata, BrokerError> {
        let injected = self
            .inner
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(BrokerError::Unavailable("injected publish failure".into()));
        }
        self.ensure_topic(topic)?;
        self.append(topic, record)
    }
}

#[async_trait]
impl Subscribable for InMemoryBroker {
    type Subscriber = InMemorySubscriber;

    async fn subscriber(
        &self,
        group: &str,
        topic: &str,
    ) -> Result<InMemorySubscriber, BrokerError> {
        self.ensure_topic(topic)?;
        Ok(InMemorySubscriber {
            broker: self.clone(),
            group: group.to_string(),
            topic: topic.to_string(),
            next_partition: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl TopicAdmin for InMemoryBroker {
    async fn list_topics(&self) -> Result<Vec<String>, BrokerError> {
        let topics = self
            .inner
            .topics
            .read()
            .map_err(|_| BrokerError::LockPoisoned("list_topics"))?;
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_topics(&self, new_topics: &[NewTopic]) -> Result<(), BrokerError> {
        let mut topics = self
            .inner
            .topics
            .write()
            .map_err(|_| BrokerError::LockPoisoned("create_topics"))?;
        if let Some(existing) = new_topics.iter().find(|t| topics.contains_key(&t.name)) {
            return Err(BrokerError::Rejected(format!(
                "topic {} already exists",
                existing.name
            )));
        }
        for topic in new_topics {
            if topic.name.is_empty() || topic.partitions == 0 || topic.replication == 0 {
                return Err(BrokerError::InvalidTopic(topic.name.clone()));
            }
        }
        for topic in new_topics {
            topics.insert(topic.name.clone(), TopicLog::new(topic.partitions));
        }
        Ok(())
    }
}

/// A consumer-group subscription to one topic of an [`InMemoryBroker`].
///
/// Offsets advance when a record is handed out; partitions are visited
/// round robin so one busy partition cannot starve the others.
pub struct InMemorySubscriber {
    broker: InMemoryBroker,
    group: String,
    topic: String,
    next_partition: AtomicU32,
}

impl InMemorySubscriber {
    fn try_next(&self) -> Result<Option<Record>, BrokerError> {
        let inner = &self.broker.inner;
        let topics = inner
            .topics
            .read()
            .map_err(|_| BrokerError::LockPoisoned("poll"))?;
        let Some(log) = topics.get(&self.topic) else {
            return Ok(None);
        };
        let mut offsets = inner
            .offsets
            .lock()
            .map_err(|_| BrokerError::LockPoisoned("poll"))?;

        let count = log.partitions.len() as u32;
        let start = self.next_partition.load(Ordering::Relaxed);
        for step in 0..count {
            let partition = (start + step) % count;
            let key = (self.group.clone(), self.topic.clone(), partition);
            let next = offsets.entry(key).or_insert(0);
            if let Some(record) = log.partitions[partition as usize].get(*next as usize) {
                *next += 1;
                self.next_partition
                    .store((partition + 1) % count, Ordering::Relaxed);
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Subscriber for InMemorySubscriber {
    async fn poll(&self, timeout: Duration) -> Result<Option<Record>, BrokerError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before looking, so an append between the
            // check and the wait is not missed.
            let appended = self.broker.inner.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            if let Some(record) = self.try_next()? {
                return Ok(Some(record));
            }

            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, record: &Record) -> Result<(), BrokerError> {
        let key = (self.group.clone(), record.topic.clone(), record.partition);
        self.broker
            .inner
            .acked
            .lock()
            .map_err(|_| BrokerError::LockPoisoned("ack"))?
            .entry(key)
            .and_modify(|offset| *offset = (*offset).max(record.offset))
            .or_insert(record.offset);
        Ok(())
    }
}
