//! Administrative operations on topics.

use async_trait::async_trait;

use super::error::BrokerError;

/// A topic to be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTopic {
    pub name: String,
    pub partitions: u32,
    pub replication: u16,
}

impl NewTopic {
    pub fn new(name: impl Into<String>, partitions: u32, replication: u16) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication,
        }
    }
}

/// Trait for inspecting and creating topics.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Names of all existing topics.
    async fn list_topics(&self) -> Result<Vec<String>, BrokerError>;

    /// Create the given topics. Fails if any already exists.
    async fn create_topics(&self, topics: &[NewTopic]) -> Result<(), BrokerError>;
}
