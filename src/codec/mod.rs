//! Serializer / deserializer between typed payloads and broker bytes.
//!
//! Both functions are pure and hold no shared state, so they can be called
//! concurrently from any number of consumer tasks. The representation is
//! JSON; `deserialize(serialize(v)) == v` for every JSON-representable `v`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Error type for codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("cannot deserialize an empty payload")]
    Empty,
    #[error("payload is not valid UTF-8 at byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },
    #[error("malformed payload at line {line}, column {column}: {source}")]
    Malformed {
        line: usize,
        column: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Encode a value into broker bytes.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::Serialize)
}

/// Decode broker bytes into a typed value.
///
/// Fails fast on empty input, invalid UTF-8, malformed JSON, or JSON that
/// does not fit `T`. Nothing is coerced or dropped silently.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::Empty);
    }
    let text = std::str::from_utf8(bytes).map_err(|e| CodecError::InvalidUtf8 {
        valid_up_to: e.valid_up_to(),
    })?;
    deserialize_str(text)
}

/// Decode a textual payload into a typed value.
pub fn deserialize_str<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    if text.trim().is_empty() {
        return Err(CodecError::Empty);
    }
    serde_json::from_str(text).map_err(|source| CodecError::Malformed {
        line: source.line(),
        column: source.column(),
        source,
    })
}
