//! Records for topics nobody handles are dropped without side effects.

use std::time::Duration;

use msbus::bus::{Record, RecordHeaders};
use msbus::consumer::Delivery;
use msbus::Message;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::support::{fast_registry, Harness};

fn record(topic: &str) -> Record {
    let envelope = Message::event(json!({ "id": 1 })).into_envelope("billing");
    Record {
        topic: topic.into(),
        partition: 0,
        offset: 0,
        key: Some(envelope.key.clone()),
        value: serde_json::to_vec(&envelope).unwrap(),
        headers: RecordHeaders::new(),
        timestamp: 0,
    }
}

#[tokio::test]
async fn unknown_topic_is_dropped_and_consumer_keeps_going() {
    let registry = fast_registry()
        .handler("ms.echo", |ctx| async move { Ok(ctx.raw_input().clone()) })
        .seal()
        .unwrap();
    let harness = Harness::start(registry, &["ms.echo"]).await;

    let outcome = harness.consumer.process(&record("ms.invoice.paid")).await;
    assert_eq!(outcome, Delivery::Dropped);
    assert!(harness.broker.records("ms.invoice.paid.dead-letter").is_empty());
    assert!(harness.broker.records("ms.invoice.paid.reply").is_empty());

    let response = harness
        .producer
        .send_and_receive("ms.echo", Message::query(json!({ "still": "alive" })), None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({ "still": "alive" })));
    assert_eq!(harness.handle.stats().dropped, 1);
}

#[tokio::test]
async fn request_to_unhandled_topic_times_out() {
    let harness = Harness::start(fast_registry().seal().unwrap(), &["ms.nobody"]).await;

    let err = harness
        .producer
        .send_and_receive(
            "ms.nobody",
            Message::command(json!({})),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}
