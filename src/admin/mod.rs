//! Topic administration: idempotent creation and existence checks.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::bus::{BrokerError, NewTopic, TopicAdmin};
use crate::topic;

/// Error type for topic administration.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid topic name: {0:?}")]
    InvalidTopic(String),
    #[error("partitions and replication factor must be at least 1")]
    InvalidSettings,
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Topic administration over any [`TopicAdmin`] broker.
///
/// ## Example
///
/// ```ignore
/// let admin = Admin::new(broker.clone());
/// let created = admin
///     .create_topics_if_missing(&["ms.user.create", "ms.user.get"], 3, 1)
///     .await?;
/// assert!(admin.topics_exist(&["ms.user.create"]).await?);
/// ```
pub struct Admin<A: TopicAdmin> {
    broker: Arc<A>,
}

impl<A: TopicAdmin> Admin<A> {
    pub fn new(broker: Arc<A>) -> Self {
        Self { broker }
    }

    /// Names of all topics, sorted.
    pub async fn list_topics(&self) -> Result<Vec<String>, AdminError> {
        let mut topics = self.broker.list_topics().await?;
        topics.sort();
        Ok(topics)
    }

    /// Whether every name in `names` exists. `true` for an empty list.
    pub async fn topics_exist(&self, names: &[&str]) -> Result<bool, AdminError> {
        let existing: BTreeSet<String> = self.broker.list_topics().await?.into_iter().collect();
        Ok(names.iter().all(|name| existing.contains(*name)))
    }

    /// Create the topics of `names` that do not exist yet.
    ///
    /// Existing topics are left untouched, whatever their settings. Returns
    /// the names actually created. A topic created concurrently by another
    /// process between the check and the create counts as existing.
    pub async fn create_topics_if_missing(
        &self,
        names: &[&str],
        partitions: u32,
        replication: u16,
    ) -> Result<Vec<String>, AdminError> {
        if partitions == 0 || replication == 0 {
            return Err(AdminError::InvalidSettings);
        }
        for name in names {
            topic::validate(name).map_err(|_| AdminError::InvalidTopic(name.to_string()))?;
        }

        let existing: BTreeSet<String> = self.broker.list_topics().await?.into_iter().collect();
        let missing: BTreeSet<&str> = names
            .iter()
            .copied()
            .filter(|name| !existing.contains(*name))
            .collect();
        if missing.is_empty() {
            debug!(?names, "all topics already exist");
            return Ok(Vec::new());
        }

        let new_topics: Vec<NewTopic> = missing
            .iter()
            .map(|name| NewTopic::new(*name, partitions, replication))
            .collect();

        match self.broker.create_topics(&new_topics).await {
            Ok(()) => {}
            Err(err) => {
                // Lost a creation race: fine if everything exists now.
                let now: BTreeSet<String> = self.broker.list_topics().await?.into_iter().collect();
                if !missing.iter().all(|name| now.contains(*name)) {
                    return Err(err.into());
                }
                debug!(error = %err, "topics created concurrently");
                return Ok(Vec::new());
            }
        }

        let created: Vec<String> = missing.into_iter().map(str::to_string).collect();
        info!(?created, partitions, replication, "topics created");
        Ok(created)
    }
}
