//! HTTP gateway integration tests.
//!
//! Starts an axum server and exercises it with reqwest.

use std::sync::Arc;

use msbus::{InMemoryBroker, Producer};
use serde_json::json;

use crate::handlers;
use crate::support::Harness;

/// Bind to port 0 and return the actual address.
async fn start_server(producer: Arc<Producer<InMemoryBroker>>) -> String {
    let app = msbus::http::router(producer);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn harness() -> Harness {
    let registry = msbus::register_handlers!(
        msbus::RegistryBuilder::new(),
        handlers::user_create,
        handlers::user_get,
    )
    .seal()
    .unwrap();
    Harness::start(registry, &["ms.user.create", "ms.user.get"]).await
}

#[tokio::test]
async fn health_check() {
    let harness = harness().await;
    let base = start_server(harness.producer.clone()).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["pendingRequests"], 0);
}

#[tokio::test]
async fn request_reply_over_http() {
    let harness = harness().await;
    let base = start_server(harness.producer.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/ms.user.get"))
        .header("x-correlation-id", "http-trace-1")
        .json(&json!({ "id": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["username"], "ada");
    assert_eq!(body["metadata"]["correlationId"], "http-trace-1");
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let harness = harness().await;
    let base = start_server(harness.producer.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/ms.user.get"))
        .json(&json!({ "id": 8 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let resp = client
        .post(format!("{base}/ms.user.create"))
        .json(&json!({ "username": "ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Not registered for replies: internal error, not a hang.
    let resp = client
        .post(format!("{base}/ms.order.place"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn timeout_is_gateway_timeout() {
    let harness = Harness::start(
        crate::support::fast_registry().seal().unwrap(),
        &["ms.nobody"],
    )
    .await;
    let base = start_server(harness.producer.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/ms.nobody"))
        .header("x-timeout-ms", "50")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 504);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "TIMEOUT");
}
