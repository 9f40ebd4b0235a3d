//! Dead-letter records: what lands on `<topic>.dead-letter`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::Record;

/// A permanently failed message.
///
/// ```json
/// {
///   "originalTopic": "ms.user.create",
///   "originalMessage": { "key": "...", "value": { ... }, "metadata": { ... } },
///   "error": { "message": "...", "stack": "..." },
///   "timestamp": "2024-05-01T12:00:00.000Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub original_topic: String,
    /// The original payload: JSON when it parses, otherwise the raw text.
    pub original_message: Value,
    /// Set to `"base64"` when the payload was not UTF-8.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_encoding: Option<String>,
    pub error: DeadLetterError,
    /// ISO-8601, UTC.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl DeadLetter {
    pub fn new(record: &Record, message: impl Into<String>, stack: Option<String>) -> Self {
        let (original_message, original_encoding) = original_payload(&record.value);
        Self {
            original_topic: record.topic.clone(),
            original_message,
            original_encoding,
            error: DeadLetterError {
                message: message.into(),
                stack,
            },
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

fn original_payload(bytes: &[u8]) -> (Value, Option<String>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => match serde_json::from_str(text) {
            Ok(value) => (value, None),
            Err(_) => (Value::String(text.to_string()), None),
        },
        Err(_) => (
            Value::String(STANDARD.encode(bytes)),
            Some("base64".to_string()),
        ),
    }
}
