//! Error type for producer operations.

use std::time::Duration;

use thiserror::Error;

use crate::bus::BrokerError;
use crate::codec::CodecError;
use crate::envelope::ErrorBody;
use crate::normalizer::ErrorCode;

/// Error type for `send` / `send_and_receive`.
///
/// A [`ProducerError::Timeout`] means "outcome unknown": the request may
/// still have been processed after the waiter gave up.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// No reply arrived within the deadline.
    #[error("no reply from {topic} for request {request_id} within {timeout:?}")]
    Timeout {
        topic: String,
        request_id: String,
        timeout: Duration,
    },
    /// Publishing failed after every retry.
    #[error("publish to {topic} failed after {attempts} attempts: {source}")]
    Publish {
        topic: String,
        attempts: u32,
        #[source]
        source: BrokerError,
    },
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
    /// `send_and_receive` on a topic whose replies were never registered.
    #[error("replies for topic {0} were not registered before connect")]
    NotRegistered(String),
    /// Events are one-way and cannot be used for request/reply.
    #[error("{0} messages do not expect a reply")]
    NotARequest(&'static str),
    #[error("producer is not connected")]
    NotConnected,
    #[error("producer is already connected; reply topics are fixed")]
    AlreadyConnected,
    /// Another call with the same request id is still waiting for its reply.
    #[error("request {0} is already awaiting a reply")]
    DuplicateRequest(String),
    /// The producer disconnected while the call was waiting.
    #[error("producer disconnected while waiting for a reply")]
    Disconnected,
}

impl ProducerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProducerError::Timeout { .. })
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProducerError::Timeout { .. } => ErrorCode::Timeout,
            ProducerError::Publish { .. } | ProducerError::Broker(_) => {
                ErrorCode::ServiceUnavailable
            }
            ProducerError::Codec(_)
            | ProducerError::NotARequest(_)
            | ProducerError::DuplicateRequest(_) => ErrorCode::ValidationError,
            ProducerError::NotRegistered(_)
            | ProducerError::NotConnected
            | ProducerError::AlreadyConnected
            | ProducerError::Disconnected => ErrorCode::InternalServerError,
        }
    }

    /// Normalize into the response error shape.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.error_code().as_str(), self.to_string())
    }
}
