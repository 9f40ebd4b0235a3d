//! Publisher trait for appending records to a topic.

use async_trait::async_trait;

use super::error::BrokerError;
use super::record::{OutboundRecord, RecordMetadata};

/// Trait for publishing records to the broker.
///
/// Implementations might include:
/// - `InMemoryBroker` - For testing and single-process scenarios
/// - A Kafka / Redpanda client
/// - Any partitioned, append-only log with per-partition ordering
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Append a single record to `topic`.
    async fn publish(
        &self,
        topic: &str,
        record: OutboundRecord,
    ) -> Result<RecordMetadata, BrokerError>;

    /// Append multiple records to `topic`.
    ///
    /// Default implementation publishes records sequentially.
    /// Implementations may override for batch optimization.
    async fn publish_batch(
        &self,
        topic: &str,
        records: Vec<OutboundRecord>,
    ) -> Result<Vec<RecordMetadata>, BrokerError> {
        let mut landed = Vec::with_capacity(records.len());
        for record in records {
            landed.push(self.publish(topic, record).await?);
        }
        Ok(landed)
    }
}
