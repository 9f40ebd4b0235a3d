//! Response envelope: the only shape returned from a request/reply call.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::metadata::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Error shape of a response: `{ code, message, details? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// `{ status, data?, error?, metadata? }`.
///
/// `data` is present iff `status == success`, `error` iff `status == error`.
/// The constructors uphold this; [`ResponseEnvelope::is_well_formed`] checks
/// envelopes received from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T = Value> {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl<T> ResponseEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: Status::Success,
            data: Some(data),
            error: None,
            metadata: None,
        }
    }

    pub fn error(error: ErrorBody) -> Self {
        Self {
            status: Status::Error,
            data: None,
            error: Some(error),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// `error` populated iff `status == error`, never alongside `data`, and
    /// carrying a non-empty code and message.
    ///
    /// A success may lack `data`: a handler answering `null` decodes that way.
    pub fn is_well_formed(&self) -> bool {
        match self.status {
            Status::Success => self.error.is_none(),
            Status::Error => {
                self.data.is_none()
                    && self.error.as_ref().is_some_and(|e| {
                        !e.code.trim().is_empty() && !e.message.trim().is_empty()
                    })
            }
        }
    }

    /// Convert into a `Result`, consuming the envelope.
    pub fn into_result(self) -> Result<T, ErrorBody> {
        match (self.status, self.data, self.error) {
            (Status::Success, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(error),
            (Status::Success, None, None) => Err(ErrorBody::new(
                "INTERNAL_SERVER_ERROR",
                "success response without data",
            )),
            (Status::Error, _, None) => Err(ErrorBody::new(
                "INTERNAL_SERVER_ERROR",
                "error response without error body",
            )),
        }
    }
}

impl ResponseEnvelope<Value> {
    /// Decode the `data` payload into a typed value.
    pub fn decode<T: DeserializeOwned>(self) -> Result<ResponseEnvelope<T>, serde_json::Error> {
        let data = match self.data {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        Ok(ResponseEnvelope {
            status: self.status,
            data,
            error: self.error,
            metadata: self.metadata,
        })
    }
}
