//! Handler: ms.user.get

use msbus::registry::{HandlerResult, MessageContext};
use msbus::HandlerError;
use serde_json::json;

pub const TOPIC: &str = "ms.user.get";

pub fn guard(ctx: &MessageContext) -> bool {
    ctx.has_field("id")
}

pub async fn handle(ctx: MessageContext) -> HandlerResult {
    match ctx.raw_input()["id"].as_u64() {
        Some(7) => Ok(json!({ "id": 7, "username": "ada" })),
        Some(id) => Err(HandlerError::NotFound(format!("no user {id}"))),
        None => Err(HandlerError::validation("id must be a number")),
    }
}
