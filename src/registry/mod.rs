//! Handler registry: explicit, startup-time registration of message
//! handlers by topic.
//!
//! ## Handler Convention
//!
//! Each handler module follows this convention and is registered with
//! [`register_handlers!`](crate::register_handlers):
//!
//! ```ignore
//! // src/handlers/user_create.rs
//!
//! pub const TOPIC: &str = "ms.user.create";
//!
//! pub fn guard(ctx: &MessageContext) -> bool {
//!     ctx.has_fields(&["username"])
//! }
//!
//! pub async fn handle(ctx: MessageContext) -> HandlerResult {
//!     ctx.require_fields(&["username", "email"])?;
//!     let input = ctx.input::<CreateUser>()?;
//!     Ok(json!({ "username": input.username }))
//! }
//! ```

mod context;
mod handler;
#[allow(clippy::module_inception)]
mod registry;

pub use context::MessageContext;
pub use handler::{HandlerEntry, HandlerOptions, HandlerResult, InvokeError};
pub use registry::{HandlerRegistry, RegistryBuilder, RegistryError};

/// Register handler modules with a registry builder using the convention
/// pattern.
///
/// Each handler module must export:
/// - `TOPIC: &str`: the topic the handler consumes
/// - `guard(&MessageContext) -> bool`: input pre-check
/// - `async fn handle(MessageContext) -> HandlerResult`: the handler
///
/// # Example
/// ```ignore
/// let registry = msbus::register_handlers!(
///     RegistryBuilder::new(),
///     handlers::user_create,
///     handlers::user_get,
/// )
/// .seal()?;
/// ```
#[macro_export]
macro_rules! register_handlers {
    ($builder:expr, $( $($seg:ident)::+ ),+ $(,)?) => {
        $builder
        $(
            .handler_guarded(
                $($seg)::+::TOPIC,
                $($seg)::+::guard,
                $($seg)::+::handle,
            )
        )+
    };
}
