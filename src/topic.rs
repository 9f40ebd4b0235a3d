//! Topic naming helpers.
//!
//! Topics follow `<prefix>.<service>.<entity>.<action>` (e.g. `ms.user.create`).
//! Two derived topics exist for every topic: `<topic>.dead-letter` for
//! permanently failed messages and `<topic>.reply` for request/reply answers.

use crate::bus::BrokerError;

pub const DEAD_LETTER_SUFFIX: &str = ".dead-letter";
pub const REPLY_SUFFIX: &str = ".reply";

/// The escalation topic for `topic`.
pub fn dead_letter(topic: &str) -> String {
    format!("{topic}{DEAD_LETTER_SUFFIX}")
}

/// The reply topic for `topic`.
pub fn reply(topic: &str) -> String {
    format!("{topic}{REPLY_SUFFIX}")
}

pub fn is_dead_letter(topic: &str) -> bool {
    topic.ends_with(DEAD_LETTER_SUFFIX)
}

pub fn is_reply(topic: &str) -> bool {
    topic.ends_with(REPLY_SUFFIX)
}

/// Check a topic name: non-empty dot-separated segments of `[A-Za-z0-9_-]`.
pub fn validate(topic: &str) -> Result<(), BrokerError> {
    let valid = !topic.is_empty()
        && topic.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if valid {
        Ok(())
    } else {
        Err(BrokerError::InvalidTopic(topic.to_string()))
    }
}
