//! Envelope metadata: identity, causality and classification of a message.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classifies the intent of a message.
///
/// Commands and queries expect a reply; events are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Command,
    Query,
    Event,
}

impl MessageType {
    /// Whether a message of this type expects a reply.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, MessageType::Event)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Command => "command",
            MessageType::Query => "query",
            MessageType::Event => "event",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata carried by every envelope.
///
/// All five fields are always populated. Instances are built through
/// [`Metadata::generate`] or [`MetadataOverrides::merge`] and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub id: String,
    pub correlation_id: String,
    pub timestamp: i64,
    pub source: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
}

impl Metadata {
    /// Fresh metadata for a new, uncorrelated message.
    pub fn generate(source: impl Into<String>, message_type: MessageType) -> Self {
        let id = generate_id();
        Self {
            correlation_id: id.clone(),
            id,
            timestamp: now_millis(),
            source: source.into(),
            message_type,
        }
    }

    /// Metadata for a message caused by this one.
    ///
    /// Gets a new `id` and timestamp; the `correlation_id` is carried over.
    pub fn caused(&self, source: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            id: generate_id(),
            correlation_id: self.correlation_id.clone(),
            timestamp: now_millis(),
            source: source.into(),
            message_type,
        }
    }

    /// Whether every field is populated.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty()
            && !self.correlation_id.is_empty()
            && self.timestamp > 0
            && !self.source.is_empty()
    }
}

/// Caller-supplied metadata fields, merged over generated defaults.
///
/// The message type is deliberately absent: it is fixed by the message
/// category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataOverrides {
    pub id: Option<String>,
    pub correlation_id: Option<String>,
    pub timestamp: Option<i64>,
    pub source: Option<String>,
}

impl MetadataOverrides {
    /// Build complete metadata: supplied fields win, missing ones are generated.
    ///
    /// When only `id` is supplied the correlation id follows it, so a fresh
    /// request still satisfies `correlation_id == id`.
    pub fn merge(self, default_source: &str, message_type: MessageType) -> Metadata {
        let id = non_empty(self.id).unwrap_or_else(generate_id);
        let correlation_id = non_empty(self.correlation_id).unwrap_or_else(|| id.clone());
        let source = non_empty(self.source).unwrap_or_else(|| default_source.to_string());
        Metadata {
            id,
            correlation_id,
            timestamp: self.timestamp.filter(|t| *t > 0).unwrap_or_else(now_millis),
            source,
            message_type,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Time-ordered, random-suffixed identifier (UUIDv7).
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Milliseconds since the Unix epoch, never going backwards within the process.
pub fn now_millis() -> i64 {
    let wall = chrono::Utc::now().timestamp_millis();
    let previous = LAST_TIMESTAMP.fetch_max(wall, Ordering::AcqRel);
    previous.max(wall)
}
