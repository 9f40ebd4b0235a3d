//! Error type for broker client operations.

use thiserror::Error;

/// Error type for publish, subscribe and admin operations against the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    /// The topic does not exist and cannot be auto-created.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    /// The topic name is not acceptable.
    #[error("invalid topic name: {0}")]
    InvalidTopic(String),
    /// The broker rejected the record or request.
    #[error("rejected by broker: {0}")]
    Rejected(String),
    /// Timed out waiting for the broker.
    #[error("broker operation timed out")]
    Timeout,
    /// An internal lock was poisoned by a panicking thread.
    #[error("broker lock poisoned during {0}")]
    LockPoisoned(&'static str),
    /// Other error.
    #[error("broker error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BrokerError {
    /// Whether retrying the same operation later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Unavailable(_) | BrokerError::Timeout)
    }
}
