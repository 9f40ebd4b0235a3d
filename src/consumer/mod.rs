//! Consumer side of the bus.
//!
//! Per record: look up the handler for its topic, decode the envelope, run
//! the handler under its retry policy, answer requests on their reply topic,
//! and publish permanently failed messages to `<topic>.dead-letter`.
//!
//! | Outcome                         | Retried | Reply sent       | Dead letter |
//! |---------------------------------|---------|------------------|-------------|
//! | handler succeeds                | -       | success          | no          |
//! | business error (validation, …) | no      | normalized error | no          |
//! | transient error / panic         | yes     | after exhaustion | yes         |
//! | payload does not decode         | no      | `VALIDATION_ERROR` | yes       |
//! | no handler for topic            | no      | no               | no          |

#[allow(clippy::module_inception)]
mod consumer;
mod dead_letter;
mod handle;

pub use consumer::{Consumer, ConsumerConfig, Delivery};
pub use dead_letter::{DeadLetter, DeadLetterError};
pub use handle::{ConsumerHandle, ConsumerStats};
