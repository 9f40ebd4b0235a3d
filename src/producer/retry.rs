//! Bounded, constant-delay publish retry.

use std::time::Duration;

use tracing::warn;

use crate::bus::{BrokerError, OutboundRecord, Publisher, RecordMetadata};

/// Publish `record`, retrying up to `retries` more times with a constant
/// `delay` between attempts.
///
/// Only transient broker errors are retried. On a permanent error or on
/// exhaustion returns the number of attempts made and the last error.
pub(crate) async fn publish_with_retry<P: Publisher + ?Sized>(
    publisher: &P,
    topic: &str,
    record: OutboundRecord,
    retries: u32,
    delay: Duration,
) -> Result<RecordMetadata, (u32, BrokerError)> {
    let attempts = retries.saturating_add(1);
    let mut attempt = 1;
    loop {
        match publisher.publish(topic, record.clone()).await {
            Ok(landed) => return Ok(landed),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!(
                    topic,
                    attempt,
                    max_attempts = attempts,
                    error = %err,
                    "publish failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err((attempt, err)),
        }
    }
}
