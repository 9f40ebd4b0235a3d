//! End-to-end scenarios: validation failure and retry exhaustion.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use msbus::consumer::DeadLetter;
use msbus::registry::RegistryBuilder;
use msbus::{HandlerError, Message, Status};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::handlers;
use crate::support::{eventually, fast_registry, Harness, POLL};

#[tokio::test]
async fn missing_field_is_a_validation_error_without_dead_letter() {
    let registry = msbus::register_handlers!(RegistryBuilder::new(), handlers::user_create)
        .seal()
        .unwrap();
    let harness = Harness::start(registry, &["ms.user.create"]).await;

    let response = harness
        .producer
        .send_and_receive(
            "ms.user.create",
            Message::command(json!({ "username": "ada" })),
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.status, Status::Error);
    assert!(response.data.is_none());
    let error = response.error.unwrap();
    assert_eq!(error.code, "VALIDATION_ERROR");
    assert_eq!(error.details.unwrap()["fields"][0]["field"], "email");

    tokio::time::sleep(POLL * 5).await;
    assert_eq!(harness.broker.len("ms.user.create.dead-letter"), 0);
    assert_eq!(harness.handle.stats().rejected, 1);
}

#[tokio::test]
async fn always_failing_handler_runs_four_times_then_dead_letters_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&calls);
    let registry = fast_registry()
        .handler("ms.order.charge", move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            async { Err(HandlerError::ServiceUnavailable("payments down".into())) }
        })
        .seal()
        .unwrap();
    let harness = Harness::start(registry, &[]).await;

    harness
        .producer
        .send("ms.order.charge", Message::event(json!({ "orderId": "o-1" })))
        .await
        .unwrap();

    let broker = harness.broker.clone();
    assert!(eventually(|| {
        let broker = broker.clone();
        async move { broker.len("ms.order.charge.dead-letter") == 1 }
    })
    .await);
    tokio::time::sleep(POLL * 5).await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let dead = harness.broker.records("ms.order.charge.dead-letter");
    assert_eq!(dead.len(), 1);

    let dead: DeadLetter = dead[0].decode().unwrap();
    assert_eq!(dead.original_topic, "ms.order.charge");
    assert_eq!(dead.original_message["value"], json!({ "orderId": "o-1" }));
    assert_eq!(dead.error.message, "service unavailable: payments down");

    let stats = harness.handle.stop().await;
    assert_eq!(stats.dead_lettered, 1);
    assert_eq!(stats.handled, 0);
}

#[tokio::test]
async fn panicking_handler_is_retried_like_any_failure() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&calls);
    let registry = fast_registry()
        .handler("ms.order.ship", move |ctx| {
            counted.fetch_add(1, Ordering::SeqCst);
            async move {
                if ctx.attempt() < 2 {
                    panic!("carrier client not ready");
                }
                Ok(json!({ "shipped": true }))
            }
        })
        .seal()
        .unwrap();
    let harness = Harness::start(registry, &["ms.order.ship"]).await;

    let response = harness
        .producer
        .send_and_receive("ms.order.ship", Message::command(json!({})), None)
        .await
        .unwrap();

    assert_eq!(response.data, Some(json!({ "shipped": true })));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(harness.broker.len("ms.order.ship.dead-letter"), 0);
}
