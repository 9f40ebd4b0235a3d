//! Producer side of the bus: `send` and `send_and_receive`.
//!
//! Requests carry two record headers the consumer uses to route the answer:
//! [`REPLY_TOPIC_HEADER`] names the topic the reply goes to and
//! [`REQUEST_ID_HEADER`] echoes the request's `metadata.id`.

mod error;
mod pending;
#[allow(clippy::module_inception)]
mod producer;
pub(crate) mod retry;

pub use error::ProducerError;
pub use producer::{Producer, ProducerConfig};

/// Record header naming the topic a reply must be published to.
pub const REPLY_TOPIC_HEADER: &str = "x-reply-topic";
/// Record header carrying the id of the request being answered.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
