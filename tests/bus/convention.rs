//! Handlers registered through the module convention.

use msbus::registry::RegistryBuilder;
use msbus::{Message, Status};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::handlers;
use crate::support::Harness;

#[tokio::test]
async fn register_handlers_and_dispatch() {
    let registry = msbus::register_handlers!(
        RegistryBuilder::new(),
        handlers::user_create,
        handlers::user_get,
    )
    .seal()
    .unwrap();
    assert_eq!(registry.topics(), vec!["ms.user.create", "ms.user.get"]);

    let harness = Harness::start(registry, &["ms.user.create", "ms.user.get"]).await;

    let created = harness
        .producer
        .send_and_receive(
            handlers::user_create::TOPIC,
            Message::command(json!({ "username": "ada", "email": "ada@example.com" })),
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        created.data,
        Some(json!({ "username": "ada", "email": "ada@example.com" }))
    );

    let fetched = harness
        .producer
        .send_and_receive(handlers::user_get::TOPIC, Message::query(json!({ "id": 7 })), None)
        .await
        .unwrap();
    assert_eq!(fetched.status, Status::Success);
    assert_eq!(fetched.data.unwrap()["username"], "ada");
}

#[tokio::test]
async fn guard_rejects_bad_input() {
    let registry = msbus::register_handlers!(RegistryBuilder::new(), handlers::user_get)
        .seal()
        .unwrap();
    let harness = Harness::start(registry, &["ms.user.get"]).await;

    let response = harness
        .producer
        .send_and_receive("ms.user.get", Message::query(json!({ "name": "ada" })), None)
        .await
        .unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, "VALIDATION_ERROR");
    assert_eq!(harness.broker.len("ms.user.get.dead-letter"), 0);
}

#[tokio::test]
async fn business_errors_keep_their_codes() {
    let registry = msbus::register_handlers!(
        RegistryBuilder::new(),
        handlers::user_create,
        handlers::user_get,
    )
    .seal()
    .unwrap();
    let harness = Harness::start(registry, &["ms.user.create", "ms.user.get"]).await;

    let missing = harness
        .producer
        .send_and_receive("ms.user.get", Message::query(json!({ "id": 8 })), None)
        .await
        .unwrap();
    assert_eq!(missing.error.unwrap().code, "NOT_FOUND");

    let taken = harness
        .producer
        .send_and_receive(
            "ms.user.create",
            Message::command(json!({ "username": "taken", "email": "t@example.com" })),
            None,
        )
        .await
        .unwrap();
    let error = taken.error.unwrap();
    assert_eq!(error.code, "USER_EXISTS");
    assert_eq!(error.message, "user taken already exists");
}
