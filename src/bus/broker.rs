//! Combined trait for a full broker client.

use super::publisher::Publisher;
use super::subscriber::Subscribable;
use super::topic_admin::TopicAdmin;

/// Combined trait for a broker client: publish, subscribe and administer.
pub trait Broker: Publisher + Subscribable + TopicAdmin + 'static {}

// Blanket implementation
impl<T: Publisher + Subscribable + TopicAdmin + 'static> Broker for T {}
