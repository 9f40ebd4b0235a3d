//! Error type for message handlers.

use std::error::Error;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::code::ErrorCode;
use crate::bus::BrokerError;
use crate::codec::CodecError;
use crate::envelope::ErrorBody;

/// Error type for message handler operations.
///
/// Business outcomes (validation, not found, auth, domain codes) are
/// replied to the caller as-is. Unexpected failures (internal, foreign
/// errors, unavailable dependencies, timeouts) are retried and finally
/// dead-lettered; see [`HandlerError::is_retryable`].
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Input payload failed validation.
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    /// Payload decode / deserialization into the handler's input type failed.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Missing or invalid authentication.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Business rule rejection with its own code.
    #[error("{code}: {message}")]
    Domain {
        code: String,
        message: String,
        details: Option<Value>,
    },
    /// A downstream call did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),
    /// A downstream dependency is unreachable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
    /// Other error.
    #[error("handler error: {0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn validation(message: impl Into<String>) -> Self {
        HandlerError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn domain(code: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError::Domain {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal(message.into())
    }

    /// Wrap any foreign error.
    pub fn other<E: Error + Send + Sync + 'static>(err: E) -> Self {
        HandlerError::Other(Box::new(err))
    }

    /// Attach structured details to a validation or domain error.
    pub fn with_details(self, details: Value) -> Self {
        match self {
            HandlerError::Validation { message, .. } => HandlerError::Validation {
                message,
                details: Some(details),
            },
            HandlerError::Domain { code, message, .. } => HandlerError::Domain {
                code,
                message,
                details: Some(details),
            },
            other => other,
        }
    }

    /// The code this error is reported under. A blank domain code is
    /// reported as `INTERNAL_SERVER_ERROR`.
    pub fn error_code(&self) -> &str {
        match self {
            HandlerError::Validation { .. } | HandlerError::DecodeFailed(_) => {
                ErrorCode::ValidationError.as_str()
            }
            HandlerError::NotFound(_) => ErrorCode::NotFound.as_str(),
            HandlerError::Unauthorized(_) => ErrorCode::Unauthorized.as_str(),
            HandlerError::Forbidden(_) => ErrorCode::Forbidden.as_str(),
            HandlerError::Domain { code, .. } if !code.trim().is_empty() => code,
            HandlerError::Domain { .. } => ErrorCode::InternalServerError.as_str(),
            HandlerError::Timeout(_) => ErrorCode::Timeout.as_str(),
            HandlerError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable.as_str(),
            HandlerError::Internal(_) | HandlerError::Other(_) => {
                ErrorCode::InternalServerError.as_str()
            }
        }
    }

    /// Map this error to an HTTP-style status code.
    pub fn http_status(&self) -> u16 {
        super::code::http_status_for(self.error_code())
    }

    /// Whether the consumer should retry (and eventually dead-letter) the
    /// message rather than reply with this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HandlerError::Timeout(_)
                | HandlerError::ServiceUnavailable(_)
                | HandlerError::Internal(_)
                | HandlerError::Other(_)
        )
    }

    /// Message without the variant prefix.
    fn bare_message(&self) -> String {
        match self {
            HandlerError::Validation { message, .. } | HandlerError::Domain { message, .. } => {
                message.clone()
            }
            HandlerError::DecodeFailed(msg)
            | HandlerError::NotFound(msg)
            | HandlerError::Unauthorized(msg)
            | HandlerError::Forbidden(msg)
            | HandlerError::Timeout(msg)
            | HandlerError::ServiceUnavailable(msg)
            | HandlerError::Internal(msg) => msg.clone(),
            HandlerError::Other(e) => e.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            HandlerError::Validation { details, .. } | HandlerError::Domain { details, .. } => {
                details.clone()
            }
            _ => None,
        }
    }

    /// Normalize into the response error shape.
    ///
    /// Both `code` and `message` are always non-empty: a message without
    /// any text is replaced by the code.
    pub fn to_body(&self) -> ErrorBody {
        let code = self.error_code().to_string();
        let mut message = self.bare_message();
        if !message.chars().any(char::is_alphanumeric) {
            message = code.clone();
        }
        ErrorBody {
            code,
            message,
            details: self.details(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

impl From<CodecError> for HandlerError {
    fn from(err: CodecError) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

impl From<BrokerError> for HandlerError {
    fn from(err: BrokerError) -> Self {
        if err.is_transient() {
            HandlerError::ServiceUnavailable(err.to_string())
        } else {
            HandlerError::Other(Box::new(err))
        }
    }
}

/// An error body received from another service, re-raised locally.
///
/// Known codes map back onto their variants so the code survives the hop.
impl From<ErrorBody> for HandlerError {
    fn from(body: ErrorBody) -> Self {
        let ErrorBody {
            code,
            message,
            details,
        } = body;
        match ErrorCode::parse(&code) {
            Some(ErrorCode::ValidationError) => HandlerError::Validation { message, details },
            Some(ErrorCode::NotFound) => HandlerError::NotFound(message),
            Some(ErrorCode::Unauthorized) => HandlerError::Unauthorized(message),
            Some(ErrorCode::Forbidden) => HandlerError::Forbidden(message),
            Some(ErrorCode::Timeout) => HandlerError::Timeout(message),
            Some(ErrorCode::ServiceUnavailable) => HandlerError::ServiceUnavailable(message),
            Some(ErrorCode::InternalServerError) => HandlerError::Internal(message),
            None => HandlerError::Domain {
                code,
                message,
                details,
            },
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collects field-level validation failures into one `VALIDATION_ERROR`.
///
/// ## Example
///
/// ```
/// use msbus::normalizer::FieldErrors;
///
/// let mut errors = FieldErrors::new();
/// errors.add("email", "is required");
/// let err = errors.into_result().unwrap_err();
/// assert_eq!(err.error_code(), "VALIDATION_ERROR");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.errors
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error
    /// with `details.fields` listing every failure.
    pub fn into_result(self) -> Result<(), HandlerError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = self.errors.iter().map(|e| e.field.as_str()).collect();
        let message = format!("invalid fields: {}", names.join(", "));
        Err(HandlerError::Validation {
            message,
            details: Some(json!({ "fields": self.errors })),
        })
    }
}
