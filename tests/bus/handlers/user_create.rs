//! Handler: ms.user.create

use msbus::registry::{HandlerResult, MessageContext};
use msbus::HandlerError;
use serde::Deserialize;
use serde_json::json;

pub const TOPIC: &str = "ms.user.create";

#[derive(Deserialize)]
pub struct Input {
    pub username: String,
    pub email: String,
}

pub fn guard(ctx: &MessageContext) -> bool {
    ctx.raw_input().is_object()
}

pub async fn handle(ctx: MessageContext) -> HandlerResult {
    ctx.require_fields(&["username", "email"])?;
    let input = ctx.input::<Input>()?;

    if input.username == "taken" {
        return Err(HandlerError::domain(
            "USER_EXISTS",
            format!("user {} already exists", input.username),
        ));
    }

    Ok(json!({ "username": input.username, "email": input.email }))
}
