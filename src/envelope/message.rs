//! Envelope and the builder used to construct commands, queries and events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::metadata::{MessageType, Metadata, MetadataOverrides};

/// Transport-level annotations carried inside the envelope.
pub type EnvelopeHeaders = HashMap<String, Value>;

/// The wrapper around every payload sent on the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Partition-routing key.
    pub key: String,
    /// The business payload.
    pub value: T,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<EnvelopeHeaders>,
}

impl<T> Envelope<T> {
    pub fn message_type(&self) -> MessageType {
        self.metadata.message_type
    }

    /// Replace the payload, keeping key, metadata and headers.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            key: self.key,
            value: f(self.value),
            metadata: self.metadata,
            headers: self.headers,
        }
    }

    /// Look up an envelope header.
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.as_ref().and_then(|h| h.get(name))
    }
}

/// Builder for an outgoing message.
///
/// The message type is fixed by the constructor (`command`, `query`,
/// `event`); everything else may be supplied by the caller and is merged
/// over generated defaults in [`Message::into_envelope`].
///
/// ## Example
///
/// ```
/// use msbus::envelope::{Message, MessageType};
/// use serde_json::json;
///
/// let envelope = Message::command(json!({ "username": "a" }))
///     .key("k1")
///     .into_envelope("user-service");
///
/// assert_eq!(envelope.key, "k1");
/// assert_eq!(envelope.metadata.message_type, MessageType::Command);
/// assert_eq!(envelope.metadata.id, envelope.metadata.correlation_id);
/// ```
#[derive(Debug, Clone)]
pub struct Message<T> {
    message_type: MessageType,
    value: T,
    key: Option<String>,
    headers: EnvelopeHeaders,
    overrides: MetadataOverrides,
}

impl<T> Message<T> {
    fn new(message_type: MessageType, value: T) -> Self {
        Self {
            message_type,
            value,
            key: None,
            headers: HashMap::new(),
            overrides: MetadataOverrides::default(),
        }
    }

    /// A message expressing intent to change state; expects a reply.
    pub fn command(value: T) -> Self {
        Self::new(MessageType::Command, value)
    }

    /// A message requesting data; expects a reply.
    pub fn query(value: T) -> Self {
        Self::new(MessageType::Query, value)
    }

    /// A one-way message announcing a fact.
    pub fn event(value: T) -> Self {
        Self::new(MessageType::Event, value)
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Set the partition-routing key. Defaults to the message id.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: EnvelopeHeaders) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.overrides.id = Some(id.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.overrides.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.overrides.timestamp = Some(timestamp);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.overrides.source = Some(source.into());
        self
    }

    /// Mark this message as caused by `parent`, carrying its correlation id.
    pub fn caused_by(self, parent: &Metadata) -> Self {
        self.correlation_id(parent.correlation_id.clone())
    }

    /// Finalize into an envelope with complete metadata.
    pub fn into_envelope(self, default_source: &str) -> Envelope<T> {
        let metadata = self.overrides.merge(default_source, self.message_type);
        let key = self
            .key
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| metadata.id.clone());
        Envelope {
            key,
            value: self.value,
            metadata,
            headers: if self.headers.is_empty() {
                None
            } else {
                Some(self.headers)
            },
        }
    }
}
