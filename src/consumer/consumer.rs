//! The consumer: topic dispatch, bounded retry, replies and dead-lettering.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::dead_letter::DeadLetter;
use super::handle::{ConsumerHandle, Counters};
use crate::bus::{Broker, BrokerError, OutboundRecord, Record, Subscribable, Subscriber};
use crate::envelope::{Envelope, ErrorBody, MessageType, Metadata, ResponseEnvelope};
use crate::normalizer::{error_chain, ErrorCode};
use crate::producer::retry::publish_with_retry;
use crate::producer::{REPLY_TOPIC_HEADER, REQUEST_ID_HEADER};
use crate::registry::{HandlerRegistry, MessageContext};
use crate::topic;

/// Consumer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub group_id: String,
    /// `metadata.source` of replies.
    pub source: String,
    /// How long one poll blocks before checking for shutdown.
    pub poll_interval: Duration,
    /// Publish retries for replies and dead letters.
    pub publish_retries: u32,
    pub publish_retry_delay: Duration,
}

impl ConsumerConfig {
    pub fn new(group_id: impl Into<String>) -> Self {
        let group_id = group_id.into();
        Self {
            source: group_id.clone(),
            group_id,
            poll_interval: Duration::from_millis(100),
            publish_retries: 3,
            publish_retry_delay: Duration::from_millis(1000),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_publish_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.publish_retries = retries;
        self.publish_retry_delay = delay;
        self
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The handler succeeded after `attempts` invocations.
    Succeeded { attempts: u32 },
    /// The handler failed with a non-retryable error; answered, not retried.
    Rejected,
    /// Retries were exhausted, or the record could not be decoded
    /// (`attempts == 0`).
    DeadLettered { attempts: u32 },
    /// No handler is registered for the topic.
    Dropped,
}

/// Dispatches records from subscribed topics to registered handlers.
///
/// Per topic, records are processed one at a time in offset order. A
/// failing message is retried on its handler's policy; when retries run out
/// it is published to `<topic>.dead-letter` and the consumer moves on.
///
/// ## Example
///
/// ```ignore
/// let registry = RegistryBuilder::new()
///     .handler("ms.user.create", create_user)
///     .seal()?;
/// let consumer = Consumer::new(broker, registry, ConsumerConfig::new("user-service"));
/// let handle = consumer.start().await?;
/// // ...
/// let stats = handle.stop().await;
/// ```
pub struct Consumer<B: Broker> {
    broker: Arc<B>,
    registry: Arc<HandlerRegistry>,
    config: ConsumerConfig,
    counters: Arc<Counters>,
}

impl<B: Broker> Clone for Consumer<B> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<B: Broker> Consumer<B> {
    pub fn new(broker: Arc<B>, registry: HandlerRegistry, config: ConsumerConfig) -> Self {
        Self {
            broker,
            registry: Arc::new(registry),
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Subscribe to every registered topic and start one polling task per
    /// topic.
    pub async fn start(&self) -> Result<ConsumerHandle, BrokerError> {
        let topics = self.registry.topics();
        if topics.is_empty() {
            warn!(group_id = %self.config.group_id, "consumer started with no handlers");
        }

        let mut subscribers = Vec::with_capacity(topics.len());
        for topic in &topics {
            subscribers.push(self.broker.subscriber(&self.config.group_id, topic).await?);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let tasks = subscribers
            .into_iter()
            .map(|subscriber| tokio::spawn(self.clone().run(subscriber, stop_rx.clone())))
            .collect();

        info!(group_id = %self.config.group_id, ?topics, "consumer started");
        Ok(ConsumerHandle {
            stop: stop_tx,
            tasks,
            counters: Arc::clone(&self.counters),
        })
    }

    async fn run(
        self,
        subscriber: <B as Subscribable>::Subscriber,
        mut stop: watch::Receiver<bool>,
    ) {
        while !*stop.borrow() {
            tokio::select! {
                _ = stop.changed() => break,
                polled = subscriber.poll(self.config.poll_interval) => {
                    Counters::bump(&self.counters.polls);
                    match polled {
                        Ok(Some(record)) => {
                            self.process(&record).await;
                            if let Err(err) = subscriber.ack(&record).await {
                                warn!(
                                    topic = %record.topic,
                                    offset = record.offset,
                                    error = %err,
                                    "ack failed"
                                );
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(error = %err, "poll failed");
                            tokio::time::sleep(self.config.poll_interval).await;
                        }
                    }
                }
            }
        }
    }

    /// Process one record end to end: decode, dispatch with retries, reply,
    /// and dead-letter on exhaustion.
    ///
    /// Never fails; every outcome is reported as a [`Delivery`].
    #[instrument(
        name = "process",
        skip(self, record),
        fields(topic = %record.topic, partition = record.partition, offset = record.offset)
    )]
    pub async fn process(&self, record: &Record) -> Delivery {
        let Some(entry) = self.registry.get(&record.topic) else {
            warn!("no handler registered for topic; message dropped");
            Counters::bump(&self.counters.dropped);
            return Delivery::Dropped;
        };

        let envelope = match record.decode::<Envelope<Value>>() {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(error = %err, "undecodable message sent to dead-letter topic");
                self.dead_letter(record, err.to_string(), Some(error_chain(&err)))
                    .await;
                let body = ErrorBody::new(
                    ErrorCode::ValidationError.as_str(),
                    format!("malformed message: {err}"),
                );
                self.reply(record, None, ResponseEnvelope::error(body)).await;
                return Delivery::DeadLettered { attempts: 0 };
            }
        };

        let options = entry.options();
        let max_attempts = options.max_attempts();
        let mut attempt = 0;
        loop {
            let ctx = MessageContext::from_record(record, envelope.clone(), attempt);
            let failure = match entry.invoke(ctx).await {
                Ok(data) => {
                    debug!(attempts = attempt + 1, "message handled");
                    Counters::bump(&self.counters.handled);
                    self.reply(record, Some(&envelope), ResponseEnvelope::success(data))
                        .await;
                    return Delivery::Succeeded {
                        attempts: attempt + 1,
                    };
                }
                Err(failure) => failure,
            };

            if !failure.is_retryable() {
                warn!(error = %failure, "message rejected");
                Counters::bump(&self.counters.rejected);
                self.reply(record, Some(&envelope), ResponseEnvelope::error(failure.to_body()))
                    .await;
                return Delivery::Rejected;
            }

            attempt += 1;
            if attempt >= max_attempts {
                error!(
                    attempts = attempt,
                    error = %failure,
                    "retries exhausted; message sent to dead-letter topic"
                );
                self.dead_letter(record, failure.to_string(), Some(failure.trace()))
                    .await;
                self.reply(record, Some(&envelope), ResponseEnvelope::error(failure.to_body()))
                    .await;
                return Delivery::DeadLettered { attempts: attempt };
            }

            warn!(
                attempt,
                max_attempts,
                delay = ?options.retry_delay,
                error = %failure,
                "handler failed, retrying"
            );
            tokio::time::sleep(options.retry_delay).await;
        }
    }

    async fn dead_letter(&self, record: &Record, message: String, stack: Option<String>) {
        let dead_letter_topic = topic::dead_letter(&record.topic);
        let dead = DeadLetter::new(record, message, stack);

        let outbound = match OutboundRecord::encode(&dead) {
            Ok(outbound) => outbound.with_headers(record.headers.clone()),
            Err(err) => {
                error!(error = %err, "failed to encode dead letter; message lost");
                Counters::bump(&self.counters.dead_letter_failed);
                return;
            }
        };
        let outbound = match &record.key {
            Some(key) => outbound.with_key(key.clone()),
            None => outbound,
        };

        match publish_with_retry(
            self.broker.as_ref(),
            &dead_letter_topic,
            outbound,
            self.config.publish_retries,
            self.config.publish_retry_delay,
        )
        .await
        {
            Ok(_) => Counters::bump(&self.counters.dead_lettered),
            Err((attempts, err)) => {
                error!(
                    topic = %dead_letter_topic,
                    attempts,
                    error = %err,
                    "failed to publish dead letter; message lost"
                );
                Counters::bump(&self.counters.dead_letter_failed);
            }
        }
    }

    /// Answer a request if it carries a reply topic. Events never do.
    async fn reply(
        &self,
        record: &Record,
        request: Option<&Envelope<Value>>,
        response: ResponseEnvelope,
    ) {
        let Some(reply_topic) = record.header(REPLY_TOPIC_HEADER) else {
            return;
        };
        let request_id = record
            .header(REQUEST_ID_HEADER)
            .map(str::to_string)
            .or_else(|| request.map(|r| r.metadata.id.clone()));
        let Some(request_id) = request_id else {
            warn!(reply_topic, "request without request id; reply skipped");
            return;
        };

        let metadata = match request {
            Some(request) => request
                .metadata
                .caused(self.config.source.clone(), request.message_type()),
            None => {
                let mut metadata = Metadata::generate(self.config.source.clone(), MessageType::Command);
                metadata.correlation_id = request_id.clone();
                metadata
            }
        };
        let response = response.with_metadata(metadata);

        let outbound = match OutboundRecord::encode(&response) {
            Ok(outbound) => outbound.with_header(REQUEST_ID_HEADER, request_id.clone()),
            Err(err) => {
                error!(error = %err, "failed to encode reply");
                return;
            }
        };
        let outbound = match request {
            Some(request) => outbound.with_key(request.key.clone()),
            None => outbound,
        };

        match publish_with_retry(
            self.broker.as_ref(),
            reply_topic,
            outbound,
            self.config.publish_retries,
            self.config.publish_retry_delay,
        )
        .await
        {
            Ok(_) => {
                Counters::bump(&self.counters.replies);
                debug!(reply_topic, request_id, success = response.is_success(), "reply sent");
            }
            Err((attempts, err)) => {
                error!(reply_topic, request_id, attempts, error = %err, "failed to publish reply");
            }
        }
    }

    /// Counters since construction.
    pub fn stats(&self) -> super::ConsumerStats {
        self.counters.snapshot()
    }
}
