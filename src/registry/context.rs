//! Context passed to message handlers.
//!
//! Carries the decoded envelope and where the record came from. Handlers
//! access everything they need through the context.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::bus::{Record, RecordHeaders};
use crate::envelope::{Envelope, EnvelopeHeaders, Message, MessageType, Metadata};
use crate::normalizer::{FieldErrors, HandlerError};

/// The context passed to every message handler.
///
/// ## Example
///
/// ```ignore
/// async fn handle(ctx: MessageContext) -> HandlerResult {
///     ctx.require_fields(&["username", "email"])?;
///     let input = ctx.input::<CreateUser>()?;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MessageContext {
    topic: String,
    partition: u32,
    offset: u64,
    /// Broker append time of the record
    timestamp: i64,
    key: String,
    metadata: Metadata,
    headers: EnvelopeHeaders,
    record_headers: RecordHeaders,
    input: Value,
    /// Zero-based delivery attempt
    attempt: u32,
}

impl MessageContext {
    /// Build a context for a decoded envelope that did not come off a
    /// broker partition (direct dispatch).
    pub fn new(topic: impl Into<String>, envelope: Envelope<Value>) -> Self {
        let timestamp = envelope.metadata.timestamp;
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            timestamp,
            key: envelope.key,
            metadata: envelope.metadata,
            headers: envelope.headers.unwrap_or_default(),
            record_headers: RecordHeaders::new(),
            input: envelope.value,
            attempt: 0,
        }
    }

    pub(crate) fn from_record(record: &Record, envelope: Envelope<Value>, attempt: u32) -> Self {
        let mut ctx = Self::new(record.topic.clone(), envelope);
        ctx.partition = record.partition;
        ctx.offset = record.offset;
        ctx.timestamp = record.timestamp;
        ctx.record_headers = record.headers.clone();
        ctx.attempt = attempt;
        ctx
    }

    /// Deserialize the input payload into a typed struct.
    pub fn input<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_value(self.input.clone())
            .map_err(|e| HandlerError::DecodeFailed(e.to_string()))
    }

    /// Get the raw JSON input.
    pub fn raw_input(&self) -> &Value {
        &self.input
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn correlation_id(&self) -> &str {
        &self.metadata.correlation_id
    }

    pub fn message_type(&self) -> MessageType {
        self.metadata.message_type
    }

    /// Zero for the first delivery, incremented on every retry.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Get an envelope header.
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    /// Get a broker record header.
    pub fn record_header(&self, name: &str) -> Option<&str> {
        self.record_headers.get(name).map(|v| v.as_str())
    }

    /// Check if the raw input contains a non-null field.
    pub fn has_field(&self, field: &str) -> bool {
        self.input.get(field).is_some_and(|v| !v.is_null())
    }

    /// Check if the raw input contains all specified fields.
    pub fn has_fields(&self, fields: &[&str]) -> bool {
        fields.iter().all(|f| self.has_field(f))
    }

    /// Fail with a field-level `VALIDATION_ERROR` listing every missing field.
    pub fn require_fields(&self, fields: &[&str]) -> Result<(), HandlerError> {
        let mut errors = FieldErrors::new();
        for field in fields.iter().filter(|f| !self.has_field(f)) {
            errors.add(*field, "is required");
        }
        errors.into_result()
    }

    /// An event caused by this message (same correlation id).
    pub fn event<T>(&self, value: T) -> Message<T> {
        Message::event(value).caused_by(&self.metadata)
    }

    /// A command caused by this message (same correlation id).
    pub fn command<T>(&self, value: T) -> Message<T> {
        Message::command(value).caused_by(&self.metadata)
    }
}
