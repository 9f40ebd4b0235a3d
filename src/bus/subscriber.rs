//! Pull-based subscription traits.

use std::time::Duration;

use async_trait::async_trait;

use super::error::BrokerError;
use super::record::Record;

/// A pull subscription to one topic within a consumer group.
///
/// Records of a partition are returned in offset order.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Wait for the next record, up to `timeout`. `Ok(None)` on timeout.
    async fn poll(&self, timeout: Duration) -> Result<Option<Record>, BrokerError>;

    /// Acknowledge that a record has been fully processed.
    async fn ack(&self, record: &Record) -> Result<(), BrokerError>;
}

/// Trait for brokers that can open subscriptions.
#[async_trait]
pub trait Subscribable: Send + Sync {
    type Subscriber: Subscriber + 'static;

    /// Open a subscription to `topic` for consumer group `group`.
    ///
    /// Subscriptions in the same group share offsets; different groups
    /// each see every record.
    async fn subscriber(&self, group: &str, topic: &str)
        -> Result<Self::Subscriber, BrokerError>;
}
