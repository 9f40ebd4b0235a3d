//! Broker records: what actually travels on a topic partition.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{self, CodecError};

/// Record headers (transport-level, string valued).
pub type RecordHeaders = BTreeMap<String, String>;

/// A record read from a topic partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    /// Partition-routing key
    pub key: Option<String>,
    /// Serialized payload
    pub value: Vec<u8>,
    pub headers: RecordHeaders,
    /// Append time, milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Record {
    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|v| v.as_str())
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Decode the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        codec::deserialize(&self.value)
    }
}

/// A record to be appended to a topic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutboundRecord {
    pub key: Option<String>,
    pub value: Vec<u8>,
    pub headers: RecordHeaders,
}

impl OutboundRecord {
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    /// Create a record with a serialized payload.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, CodecError> {
        Ok(Self::new(codec::serialize(value)?))
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: RecordHeaders) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Where a published record landed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_builder() {
        let record = OutboundRecord::encode(&json!({ "id": 1 }))
            .unwrap()
            .with_key("k1")
            .with_header("x-request-id", "abc-123");

        assert_eq!(record.key.as_deref(), Some("k1"));
        assert_eq!(record.headers["x-request-id"], "abc-123");
        assert_eq!(record.value, br#"{"id":1}"#.to_vec());
    }

    #[test]
    fn record_decode() {
        let record = Record {
            topic: "ms.user.create".into(),
            partition: 0,
            offset: 4,
            key: None,
            value: br#"{"ok":true}"#.to_vec(),
            headers: RecordHeaders::new(),
            timestamp: 1,
        };
        let value: serde_json::Value = record.decode().unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(record.value_str(), Some(r#"{"ok":true}"#));
        assert_eq!(record.header("missing"), None);
    }
}
