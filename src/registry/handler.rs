//! Handler types and per-handler retry policy.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::context::MessageContext;
use crate::envelope::ErrorBody;
use crate::normalizer::{self, error_chain, HandlerError};

/// What a handler returns: the reply data, or a failure.
pub type HandlerResult = Result<Value, HandlerError>;

type BoxedHandler = Arc<dyn Fn(MessageContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type BoxedGuard = Arc<dyn Fn(&MessageContext) -> bool + Send + Sync>;

/// Retry policy for one handler: constant delay, no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl HandlerOptions {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Fail straight to the dead-letter topic.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total attempts, the first delivery included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Why an invocation failed.
#[derive(Debug)]
pub enum InvokeError {
    /// The handler returned an error.
    Handler(HandlerError),
    /// The handler panicked; carries the panic message.
    Panicked(String),
}

impl InvokeError {
    pub fn is_retryable(&self) -> bool {
        match self {
            InvokeError::Handler(err) => err.is_retryable(),
            InvokeError::Panicked(_) => true,
        }
    }

    /// The normalized error body.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            InvokeError::Handler(err) => normalizer::normalize(err),
            InvokeError::Panicked(msg) => ErrorBody::new(
                normalizer::ErrorCode::InternalServerError.as_str(),
                format!("handler panicked: {msg}"),
            ),
        }
    }

    /// Failure trace: the error's source chain, or the panic message.
    pub fn trace(&self) -> String {
        match self {
            InvokeError::Handler(err) => error_chain(err),
            InvokeError::Panicked(msg) => format!("panicked at: {msg}"),
        }
    }
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeError::Handler(err) => write!(f, "{err}"),
            InvokeError::Panicked(msg) => write!(f, "handler panicked: {msg}"),
        }
    }
}

/// A registered handler with optional guard. Immutable once registered.
pub struct HandlerEntry {
    topic: String,
    guard: Option<BoxedGuard>,
    handle: BoxedHandler,
    options: HandlerOptions,
}

impl HandlerEntry {
    pub(crate) fn new<F, Fut>(topic: &str, options: HandlerOptions, handler: F) -> Self
    where
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            topic: topic.to_string(),
            guard: None,
            handle: Arc::new(move |ctx| handler(ctx).boxed()),
            options,
        }
    }

    pub(crate) fn with_guard<G>(mut self, guard: G) -> Self
    where
        G: Fn(&MessageContext) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn options(&self) -> HandlerOptions {
        self.options
    }

    /// Run the guard (if any) and the handler, catching panics.
    ///
    /// A rejecting guard fails with `VALIDATION_ERROR` without calling the
    /// handler.
    pub async fn invoke(&self, ctx: MessageContext) -> Result<Value, InvokeError> {
        let guard = self.guard.clone();
        let handle = Arc::clone(&self.handle);
        let topic = self.topic.clone();

        let run = async move {
            if let Some(guard) = guard {
                if !guard(&ctx) {
                    return Err(HandlerError::validation(format!(
                        "guard rejected message on {topic}"
                    )));
                }
            }
            handle(ctx).await
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(InvokeError::Handler(err)),
            Err(payload) => Err(InvokeError::Panicked(normalizer::panic_message(
                payload.as_ref(),
            ))),
        }
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("topic", &self.topic)
            .field("guarded", &self.guard.is_some())
            .field("options", &self.options)
            .finish()
    }
}
