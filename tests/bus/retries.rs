//! Retry bounds on both sides of the broker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use msbus::bus::{OutboundRecord, Publisher};
use msbus::consumer::DeadLetter;
use msbus::producer::ProducerError;
use msbus::registry::HandlerOptions;
use msbus::{HandlerError, Message};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::support::{eventually, fast_registry, Harness, POLL};

#[tokio::test]
async fn handler_options_bound_invocations() {
    for max_retries in [0u32, 1, 2] {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);
        let registry = fast_registry()
            .handler_with(
                "ms.flaky",
                HandlerOptions::new(max_retries, Duration::from_millis(5)),
                move |_| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    async { Err(HandlerError::internal("nope")) }
                },
            )
            .seal()
            .unwrap();
        let harness = Harness::start(registry, &["ms.flaky"]).await;

        let response = harness
            .producer
            .send_and_receive("ms.flaky", Message::command(json!({})), None)
            .await
            .unwrap();

        assert_eq!(response.error.unwrap().code, "INTERNAL_SERVER_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), max_retries + 1);
        assert_eq!(harness.broker.len("ms.flaky.dead-letter"), 1);
    }
}

#[tokio::test]
async fn recovery_within_bound_is_not_dead_lettered() {
    let registry = fast_registry()
        .handler("ms.recovering", |ctx| async move {
            if ctx.attempt() == 0 {
                Err(HandlerError::Timeout("inventory lookup".into()))
            } else {
                Ok(json!({ "attempt": ctx.attempt() }))
            }
        })
        .seal()
        .unwrap();
    let harness = Harness::start(registry, &["ms.recovering"]).await;

    let response = harness
        .producer
        .send_and_receive("ms.recovering", Message::command(json!({})), None)
        .await
        .unwrap();
    assert_eq!(response.data, Some(json!({ "attempt": 1 })));
    assert_eq!(harness.broker.len("ms.recovering.dead-letter"), 0);
}

#[tokio::test]
async fn undecodable_payload_goes_straight_to_dead_letter() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&calls);
    let registry = fast_registry()
        .handler("ms.user.create", move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!({})) }
        })
        .seal()
        .unwrap();
    let harness = Harness::start(registry, &[]).await;

    harness
        .broker
        .publish("ms.user.create", OutboundRecord::new(b"{\"key\":".to_vec()))
        .await
        .unwrap();

    let broker = harness.broker.clone();
    assert!(eventually(|| {
        let broker = broker.clone();
        async move { broker.len("ms.user.create.dead-letter") == 1 }
    })
    .await);
    tokio::time::sleep(POLL * 3).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let dead: DeadLetter = harness.broker.records("ms.user.create.dead-letter")[0]
        .decode()
        .unwrap();
    assert_eq!(dead.original_message, json!("{\"key\":"));
    assert!(dead.error.stack.is_some());
}

#[tokio::test]
async fn producer_publish_retries_are_bounded() {
    let harness = Harness::start(fast_registry().seal().unwrap(), &[]).await;

    // One retry configured: a single failure is absorbed.
    harness.broker.fail_next_publishes(1);
    harness
        .producer
        .send("ms.audit", Message::event(json!({})))
        .await
        .unwrap();
    assert_eq!(harness.broker.len("ms.audit"), 1);

    harness.broker.fail_next_publishes(5);
    let err = harness
        .producer
        .send("ms.audit", Message::event(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, ProducerError::Publish { attempts: 2, .. }));
    assert_eq!(err.to_body().code, "SERVICE_UNAVAILABLE");
}
