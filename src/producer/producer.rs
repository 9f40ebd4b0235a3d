//! The producer: fire-and-forget sends and request/reply over the broker.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::error::ProducerError;
use super::pending::PendingReplies;
use super::retry::publish_with_retry;
use super::{REPLY_TOPIC_HEADER, REQUEST_ID_HEADER};
use crate::bus::{Broker, OutboundRecord, Record, RecordMetadata, Subscribable, Subscriber};
use crate::envelope::{generate_id, Envelope, ErrorBody, Message, Metadata, ResponseEnvelope};
use crate::normalizer::ErrorCode;
use crate::topic;

/// Producer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub client_id: String,
    /// Default `metadata.source` for outgoing envelopes.
    pub source: String,
    /// Publish retries after the first attempt.
    pub retries: u32,
    pub retry_delay: Duration,
    /// Default `send_and_receive` deadline.
    pub request_timeout: Duration,
    /// How long a reply listener blocks in one poll.
    pub poll_interval: Duration,
}

impl ProducerConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            source: client_id.clone(),
            client_id,
            retries: 3,
            retry_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_millis(10_000),
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_retries(mut self, retries: u32, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[derive(Default)]
struct Lifecycle {
    reply_topics: BTreeSet<String>,
    connected: bool,
    stop: Option<watch::Sender<bool>>,
    listeners: Vec<JoinHandle<()>>,
}

/// Publishes envelopes and correlates replies.
///
/// Startup is two-phase: register every topic you will call with
/// [`send_and_receive`] through [`subscribe_to_response_of`], then
/// [`connect`]. Reply topics are fixed once connected.
///
/// ## Example
///
/// ```ignore
/// let producer = Producer::new(broker, ProducerConfig::new("gateway"));
/// producer.subscribe_to_response_of("ms.user.get").await?;
/// producer.connect().await?;
///
/// let reply = producer
///     .send_and_receive("ms.user.get", Message::query(json!({ "id": 7 })), None)
///     .await?;
/// ```
///
/// [`send_and_receive`]: Producer::send_and_receive
/// [`subscribe_to_response_of`]: Producer::subscribe_to_response_of
/// [`connect`]: Producer::connect
pub struct Producer<B: Broker> {
    broker: Arc<B>,
    config: ProducerConfig,
    /// Consumer group of this instance's reply listeners
    reply_group: String,
    pending: Arc<PendingReplies>,
    lifecycle: Mutex<Lifecycle>,
}

impl<B: Broker> Producer<B> {
    pub fn new(broker: Arc<B>, config: ProducerConfig) -> Self {
        let reply_group = format!("{}.replies.{}", config.client_id, generate_id());
        Self {
            broker,
            config,
            reply_group,
            pending: PendingReplies::new(),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    /// Requests currently waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub async fn is_connected(&self) -> bool {
        self.lifecycle.lock().await.connected
    }

    /// Register interest in the replies of `topic`. Idempotent.
    ///
    /// Must be called before [`connect`](Producer::connect).
    pub async fn subscribe_to_response_of(&self, topic: &str) -> Result<(), ProducerError> {
        topic::validate(topic)?;
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.connected {
            return Err(ProducerError::AlreadyConnected);
        }
        if lifecycle.reply_topics.insert(topic.to_string()) {
            debug!(topic, "reply topic registered");
        }
        Ok(())
    }

    /// Open one reply listener per registered topic. Idempotent.
    pub async fn connect(&self) -> Result<(), ProducerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.connected {
            return Ok(());
        }

        let mut subscribers = Vec::with_capacity(lifecycle.reply_topics.len());
        for request_topic in &lifecycle.reply_topics {
            let reply_topic = topic::reply(request_topic);
            let subscriber = self
                .broker
                .subscriber(&self.reply_group, &reply_topic)
                .await?;
            subscribers.push((reply_topic, subscriber));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        for (reply_topic, subscriber) in subscribers {
            lifecycle.listeners.push(tokio::spawn(listen_for_replies(
                subscriber,
                reply_topic,
                Arc::clone(&self.pending),
                self.config.poll_interval,
                stop_rx.clone(),
            )));
        }
        lifecycle.stop = Some(stop_tx);
        lifecycle.connected = true;

        info!(
            client_id = %self.config.client_id,
            reply_topics = lifecycle.reply_topics.len(),
            "producer connected"
        );
        Ok(())
    }

    /// Stop the reply listeners and fail every outstanding request with
    /// [`ProducerError::Disconnected`].
    pub async fn disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Some(stop) = lifecycle.stop.take() {
            let _ = stop.send(true);
        }
        for listener in lifecycle.listeners.drain(..) {
            if let Err(err) = listener.await {
                warn!(error = %err, "reply listener ended abnormally");
            }
        }
        lifecycle.connected = false;

        let failed = self.pending.fail_all();
        info!(client_id = %self.config.client_id, failed, "producer disconnected");
    }

    /// Fire-and-forget: wrap `message` in an envelope and publish it.
    ///
    /// Returns the envelope metadata.
    pub async fn send<T: Serialize>(
        &self,
        topic: &str,
        message: Message<T>,
    ) -> Result<Metadata, ProducerError> {
        let envelope = message.into_envelope(&self.config.source);
        self.send_envelope(topic, &envelope).await?;
        Ok(envelope.metadata)
    }

    /// Publish an already-built envelope, retrying transient failures.
    pub async fn send_envelope<T: Serialize>(
        &self,
        topic: &str,
        envelope: &Envelope<T>,
    ) -> Result<RecordMetadata, ProducerError> {
        topic::validate(topic)?;
        let record = OutboundRecord::encode(envelope)?.with_key(envelope.key.clone());
        let landed = self.publish(topic, record).await?;
        debug!(
            topic,
            id = %envelope.metadata.id,
            correlation_id = %envelope.metadata.correlation_id,
            partition = landed.partition,
            offset = landed.offset,
            "message sent"
        );
        Ok(landed)
    }

    /// Send a command or query and wait for its reply.
    ///
    /// `timeout` overrides the configured request timeout. The reply is
    /// returned whether it carries data or a normalized error; only a
    /// missing reply ([`ProducerError::Timeout`]) or a transport failure is
    /// an `Err`.
    pub async fn send_and_receive<T: Serialize>(
        &self,
        topic: &str,
        message: Message<T>,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope, ProducerError> {
        let envelope = message.into_envelope(&self.config.source);
        self.send_and_receive_envelope(topic, &envelope, timeout)
            .await
    }

    #[instrument(
        name = "send_and_receive",
        skip(self, envelope, timeout),
        fields(request_id = %envelope.metadata.id, correlation_id = %envelope.metadata.correlation_id)
    )]
    pub async fn send_and_receive_envelope<T: Serialize>(
        &self,
        topic: &str,
        envelope: &Envelope<T>,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope, ProducerError> {
        let message_type = envelope.message_type();
        if !message_type.expects_reply() {
            return Err(ProducerError::NotARequest(message_type.as_str()));
        }
        topic::validate(topic)?;
        {
            let lifecycle = self.lifecycle.lock().await;
            if !lifecycle.connected {
                return Err(ProducerError::NotConnected);
            }
            if !lifecycle.reply_topics.contains(topic) {
                return Err(ProducerError::NotRegistered(topic.to_string()));
            }
        }

        let request_id = envelope.metadata.id.clone();
        let timeout = timeout.unwrap_or(self.config.request_timeout);

        // Register before publishing so a fast reply cannot be missed.
        let mut waiter = self
            .pending
            .register(&request_id)
            .ok_or_else(|| ProducerError::DuplicateRequest(request_id.clone()))?;
        let receiver = waiter
            .take_receiver()
            .ok_or(ProducerError::Disconnected)?;

        let record = OutboundRecord::encode(envelope)?
            .with_key(envelope.key.clone())
            .with_header(REPLY_TOPIC_HEADER, topic::reply(topic))
            .with_header(REQUEST_ID_HEADER, request_id.clone());
        self.publish(topic, record).await?;
        debug!(topic, ?timeout, "request sent, awaiting reply");

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => {
                debug!(topic, success = response.is_success(), "reply received");
                Ok(response)
            }
            Ok(Err(_)) => Err(ProducerError::Disconnected),
            Err(_) => {
                warn!(topic, ?timeout, "request timed out");
                Err(ProducerError::Timeout {
                    topic: topic.to_string(),
                    request_id,
                    timeout,
                })
            }
        }
    }

    async fn publish(
        &self,
        topic: &str,
        record: OutboundRecord,
    ) -> Result<RecordMetadata, ProducerError> {
        publish_with_retry(
            self.broker.as_ref(),
            topic,
            record,
            self.config.retries,
            self.config.retry_delay,
        )
        .await
        .map_err(|(attempts, source)| ProducerError::Publish {
            topic: topic.to_string(),
            attempts,
            source,
        })
    }
}

impl<B: Broker> Drop for Producer<B> {
    fn drop(&mut self) {
        if let Some(stop) = self.lifecycle.get_mut().stop.take() {
            let _ = stop.send(true);
        }
    }
}

async fn listen_for_replies<S: Subscriber>(
    subscriber: S,
    reply_topic: String,
    pending: Arc<PendingReplies>,
    poll_interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    debug!(topic = %reply_topic, "reply listener started");
    while !*stop.borrow() {
        tokio::select! {
            _ = stop.changed() => break,
            polled = subscriber.poll(poll_interval) => match polled {
                Ok(Some(record)) => {
                    route_reply(&pending, &record);
                    if let Err(err) = subscriber.ack(&record).await {
                        warn!(topic = %reply_topic, error = %err, "failed to ack reply");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(topic = %reply_topic, error = %err, "reply poll failed");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }
    debug!(topic = %reply_topic, "reply listener stopped");
}

fn route_reply(pending: &PendingReplies, record: &Record) {
    let Some(request_id) = record.header(REQUEST_ID_HEADER) else {
        debug!(topic = %record.topic, offset = record.offset, "reply without request id ignored");
        return;
    };

    let response = match record.decode::<ResponseEnvelope>() {
        Ok(response) if response.is_well_formed() => response,
        Ok(_) => malformed_reply("reply is neither a success nor an error"),
        Err(err) => malformed_reply(&err.to_string()),
    };

    if !pending.complete(request_id, response) {
        debug!(request_id, "late or unknown reply discarded");
    }
}

fn malformed_reply(reason: &str) -> ResponseEnvelope {
    warn!(reason, "malformed reply");
    ResponseEnvelope::error(ErrorBody::new(
        ErrorCode::InternalServerError.as_str(),
        format!("malformed reply: {reason}"),
    ))
}
