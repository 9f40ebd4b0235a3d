//! Exception normalizer: turns whatever a handler fails with into the
//! response envelope's `{ code, message, details }` error shape.
//!
//! One mapping table serves every path: replies sent back over
//! request/reply, dead-letter records, and HTTP error bodies (feature
//! `http`). Handlers return `Result<Value, HandlerError>`; panics are the
//! only "thrown" failures left, and [`normalize_panic`] maps them onto the
//! same shape.

mod code;
mod error;

use std::any::Any;
use std::error::Error;

pub use code::{http_status_for, ErrorCode};
pub use error::{FieldError, FieldErrors, HandlerError};

use crate::envelope::ErrorBody;

/// Normalize a handler failure.
pub fn normalize(err: &HandlerError) -> ErrorBody {
    err.to_body()
}

/// Normalize a caught panic payload.
pub fn normalize_panic(payload: &(dyn Any + Send)) -> ErrorBody {
    ErrorBody::new(
        ErrorCode::InternalServerError.as_str(),
        format!("handler panicked: {}", panic_message(payload)),
    )
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The error and its `source()` chain, one cause per line.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut chain = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        chain.push_str("\ncaused by: ");
        chain.push_str(&inner.to_string());
        cause = inner.source();
    }
    chain
}
