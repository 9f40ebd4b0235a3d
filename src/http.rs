//! HTTP gateway: maps HTTP requests onto request/reply over the bus.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /:topic`: `send_and_receive` a command. Body = JSON payload.
//!   An `x-correlation-id` request header becomes the envelope's
//!   correlation id; `x-timeout-ms` overrides the request timeout.
//! - `GET /health`: `{ "ok": true, "pendingRequests": n }`.
//!
//! Replies and failures are returned as a response envelope, with the
//! status code taken from the same table the normalizer uses.
//!
//! ## Example
//!
//! ```ignore
//! let producer = Arc::new(Producer::new(broker, config.producer_config()));
//! producer.subscribe_to_response_of("ms.user.create").await?;
//! producer.connect().await?;
//!
//! msbus::http::serve(producer, "0.0.0.0:3000").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::bus::Broker;
use crate::envelope::{Message, ResponseEnvelope};
use crate::normalizer::{http_status_for, HandlerError};
use crate::producer::Producer;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const TIMEOUT_HEADER: &str = "x-timeout-ms";

/// Build an axum `Router` that forwards requests through the producer.
pub fn router<B: Broker>(producer: Arc<Producer<B>>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<B>))
        .route("/:topic", post(request_handler::<B>))
        .with_state(producer)
}

/// Serve the gateway at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve<B: Broker>(
    producer: Arc<Producer<B>>,
    addr: &str,
) -> Result<(), std::io::Error> {
    let app = router(producer);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health_handler<B: Broker>(
    State(producer): State<Arc<Producer<B>>>,
) -> impl IntoResponse {
    Json(json!({
        "ok": producer.is_connected().await,
        "pendingRequests": producer.pending_requests(),
    }))
}

async fn request_handler<B: Broker>(
    State(producer): State<Arc<Producer<B>>>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    Json(input): Json<Value>,
) -> Response {
    let mut message = Message::command(input);
    if let Some(correlation_id) = header_str(&headers, CORRELATION_ID_HEADER) {
        message = message.correlation_id(correlation_id);
    }
    let timeout = header_str(&headers, TIMEOUT_HEADER)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis);

    match producer.send_and_receive(&topic, message, timeout).await {
        Ok(response) => response.into_response(),
        Err(err) => ResponseEnvelope::<Value>::error(err.to_body()).into_response(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

impl IntoResponse for ResponseEnvelope<Value> {
    fn into_response(self) -> Response {
        let status = match &self.error {
            None => StatusCode::OK,
            Some(error) => StatusCode::from_u16(http_status_for(&error.code))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        };
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        ResponseEnvelope::<Value>::error(self.to_body()).into_response()
    }
}
