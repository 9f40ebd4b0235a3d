//! Message envelope and metadata: the wire schema shared by every message
//! and every response.
//!
//! ## Wire shapes
//!
//! ```text
//! request:  { key, value, metadata: { id, correlationId, timestamp, source, type }, headers? }
//! response: { status: "success"|"error", data?, error?: { code, message, details? }, metadata? }
//! ```

mod message;
mod metadata;
mod response;

pub use message::{Envelope, EnvelopeHeaders, Message};
pub use metadata::{generate_id, now_millis, MessageType, Metadata, MetadataOverrides};
pub use response::{ErrorBody, ResponseEnvelope, Status};
