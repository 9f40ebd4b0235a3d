//! Shared harness: an in-memory broker with a started consumer and a
//! connected producer.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use msbus::consumer::{ConsumerConfig, ConsumerHandle};
use msbus::producer::ProducerConfig;
use msbus::registry::{HandlerOptions, HandlerRegistry, RegistryBuilder};
use msbus::{Consumer, InMemoryBroker, Producer};

pub const POLL: Duration = Duration::from_millis(10);
pub const RETRY_DELAY: Duration = Duration::from_millis(10);

pub struct Harness {
    pub broker: InMemoryBroker,
    pub producer: Arc<Producer<InMemoryBroker>>,
    pub consumer: Consumer<InMemoryBroker>,
    pub handle: ConsumerHandle,
}

impl Harness {
    /// Start `registry` behind a consumer and connect a producer that
    /// expects replies from `reply_topics`.
    pub async fn start(registry: HandlerRegistry, reply_topics: &[&str]) -> Self {
        let broker = InMemoryBroker::new();
        let consumer = Consumer::new(
            Arc::new(broker.clone()),
            registry,
            ConsumerConfig::new("user-service")
                .with_poll_interval(POLL)
                .with_publish_retries(1, RETRY_DELAY),
        );
        let handle = consumer.start().await.unwrap();

        let producer = Producer::new(
            Arc::new(broker.clone()),
            ProducerConfig::new("gateway")
                .with_retries(1, RETRY_DELAY)
                .with_poll_interval(POLL),
        );
        for topic in reply_topics {
            producer.subscribe_to_response_of(topic).await.unwrap();
        }
        producer.connect().await.unwrap();

        Self {
            broker,
            producer: Arc::new(producer),
            consumer,
            handle,
        }
    }
}

/// A registry builder whose handlers retry quickly.
pub fn fast_registry() -> RegistryBuilder {
    RegistryBuilder::new().with_defaults(HandlerOptions::new(3, RETRY_DELAY))
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(POLL).await;
    }
    false
}
