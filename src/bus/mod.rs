//! Broker client seam: the traits this crate needs from a partitioned,
//! append-only log broker.
//!
//! The broker itself (storage, replication, partition assignment) is an
//! external dependency; everything in this crate talks to it through these
//! traits.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────┐   ┌───────────────────────┐
//! │ Producer              │   │ Consumer              │
//! │ send / sendAndReceive │   │ dispatch, retry, DLQ  │
//! └───────────────────────┘   └───────────────────────┘
//!            │                           │
//!            ▼                           ▼
//! ┌─────────────────────────────────────────────────────┐
//! │ Broker = Publisher + Subscribable + TopicAdmin      │
//! │ publish(topic, record) / subscriber(group, topic)   │
//! │ poll(timeout) / ack(record) / list / create topics  │
//! └─────────────────────────────────────────────────────┘
//!            │                           │
//!            ▼                           ▼
//! ┌───────────────────────┐   ┌───────────────────────┐
//! │ InMemoryBroker        │   │ Kafka-compatible      │
//! │ (included)            │   │ client (external)     │
//! └───────────────────────┘   └───────────────────────┘
//! ```

mod broker;
mod error;
#[cfg(feature = "in-memory")]
mod in_memory;
mod publisher;
mod record;
mod subscriber;
mod topic_admin;

pub use broker::Broker;
pub use error::BrokerError;
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryBroker, InMemorySubscriber};
pub use publisher::Publisher;
pub use record::{OutboundRecord, Record, RecordHeaders, RecordMetadata};
pub use subscriber::{Subscribable, Subscriber};
pub use topic_admin::{NewTopic, TopicAdmin};
