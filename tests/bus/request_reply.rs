//! Request/reply: correlation, timeouts and concurrent callers.

use std::time::{Duration, Instant};

use msbus::producer::{ProducerError, REPLY_TOPIC_HEADER, REQUEST_ID_HEADER};
use msbus::{Envelope, Message, MessageType, ResponseEnvelope};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::support::{fast_registry, Harness};

fn echo_registry() -> msbus::HandlerRegistry {
    fast_registry()
        .handler("ms.echo", |ctx| async move { Ok(ctx.raw_input().clone()) })
        .handler("ms.slow", |_| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(json!({ "late": true }))
        })
        .seal()
        .unwrap()
}

#[tokio::test]
async fn reply_carries_request_correlation() {
    let harness = Harness::start(echo_registry(), &["ms.echo"]).await;

    let envelope = Message::command(json!({ "n": 1 }))
        .correlation_id("trace-42")
        .into_envelope("gateway");
    let response = harness
        .producer
        .send_and_receive_envelope("ms.echo", &envelope, None)
        .await
        .unwrap();

    assert_eq!(response.data, Some(json!({ "n": 1 })));
    let metadata = response.metadata.unwrap();
    assert!(metadata.is_complete());
    assert_eq!(metadata.correlation_id, "trace-42");
    assert_ne!(metadata.id, envelope.metadata.id);
    assert_eq!(metadata.message_type, MessageType::Command);
    assert_eq!(metadata.source, "user-service");
}

#[tokio::test]
async fn request_record_carries_reply_routing() {
    let harness = Harness::start(echo_registry(), &["ms.echo"]).await;

    let response = harness
        .producer
        .send_and_receive("ms.echo", Message::query(json!({})), None)
        .await
        .unwrap();
    assert!(response.is_success());

    let requests = harness.broker.records("ms.echo");
    assert_eq!(requests.len(), 1);
    let request: Envelope<Value> = requests[0].decode().unwrap();
    assert_eq!(requests[0].header(REPLY_TOPIC_HEADER), Some("ms.echo.reply"));
    assert_eq!(
        requests[0].header(REQUEST_ID_HEADER),
        Some(request.metadata.id.as_str())
    );
    assert_eq!(requests[0].key.as_deref(), Some(request.key.as_str()));

    let replies = harness.broker.records("ms.echo.reply");
    assert_eq!(replies.len(), 1);
    let reply: ResponseEnvelope = replies[0].decode().unwrap();
    assert_eq!(
        reply.metadata.unwrap().correlation_id,
        request.metadata.correlation_id
    );
}

#[tokio::test]
async fn slow_handler_times_out_the_caller() {
    let harness = Harness::start(echo_registry(), &["ms.slow"]).await;

    let started = Instant::now();
    let err = harness
        .producer
        .send_and_receive(
            "ms.slow",
            Message::command(json!({})),
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ProducerError::Timeout { .. }));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");
    assert_eq!(err.to_body().code, "TIMEOUT");
    assert_eq!(harness.producer.pending_requests(), 0);

    // The late reply still lands on the reply topic and is discarded.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(harness.broker.len("ms.slow.reply"), 1);
    assert_eq!(harness.producer.pending_requests(), 0);
}

#[tokio::test]
async fn concurrent_requests_get_their_own_replies() {
    let harness = Harness::start(echo_registry(), &["ms.echo"]).await;

    let calls = (0..10).map(|n| {
        let producer = harness.producer.clone();
        async move {
            let response = producer
                .send_and_receive("ms.echo", Message::query(json!({ "n": n })), None)
                .await
                .unwrap();
            (n, response.data.unwrap())
        }
    });
    for (n, data) in futures::future::join_all(calls).await {
        assert_eq!(data, json!({ "n": n }));
    }
}

#[tokio::test]
async fn disconnect_fails_outstanding_requests() {
    let harness = Harness::start(echo_registry(), &["ms.slow"]).await;

    let producer = harness.producer.clone();
    let waiting = tokio::spawn(async move {
        producer
            .send_and_receive("ms.slow", Message::command(json!({})), None)
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.producer.disconnect().await;

    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, ProducerError::Disconnected));
}
