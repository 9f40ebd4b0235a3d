//! Messaging substrate for microservices on a partitioned log broker.
//!
//! Services exchange commands, queries and events wrapped in a uniform
//! envelope. The producer supports fire-and-forget sends and request/reply
//! with a timeout; the consumer dispatches to explicitly registered
//! handlers, retries failures on a fixed policy and escalates exhausted
//! messages to `<topic>.dead-letter`. Every failure a caller sees is a
//! normalized `{ code, message, details }` error.

pub mod admin;
pub mod bus;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod envelope;
#[cfg(feature = "http")]
pub mod http;
pub mod normalizer;
pub mod producer;
pub mod registry;
pub mod telemetry;
pub mod topic;

pub use admin::{Admin, AdminError};
pub use bus::{Broker, BrokerError};
#[cfg(feature = "in-memory")]
pub use bus::InMemoryBroker;
pub use codec::CodecError;
pub use config::{BusConfig, ConfigError};
pub use consumer::{Consumer, ConsumerConfig, ConsumerHandle, ConsumerStats, DeadLetter, Delivery};
pub use envelope::{Envelope, ErrorBody, Message, MessageType, Metadata, ResponseEnvelope, Status};
pub use normalizer::{ErrorCode, HandlerError};
pub use producer::{Producer, ProducerConfig, ProducerError};
pub use registry::{
    HandlerOptions, HandlerRegistry, HandlerResult, MessageContext, RegistryBuilder,
    RegistryError,
};
