//! Handler registry: topic → handler index, built once and sealed.
//!
//! Registration collects entries into a [`RegistryBuilder`]; [`seal`]
//! validates them and freezes the index into a [`HandlerRegistry`]. The
//! consumer only accepts a sealed registry, so every topic is known before
//! the broker subscription opens.
//!
//! [`seal`]: RegistryBuilder::seal

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::context::MessageContext;
use super::handler::{HandlerEntry, HandlerOptions, HandlerResult};
use crate::topic;

/// Error type for registry construction.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid handler topic: {0:?}")]
    InvalidTopic(String),
    #[error("handlers cannot subscribe to derived topic {0}")]
    DerivedTopic(String),
}

/// Collects handler registrations at bootstrap.
///
/// Uses builder pattern: every method returns `self` for chaining.
///
/// ## Example
///
/// ```
/// use msbus::registry::{HandlerOptions, RegistryBuilder};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let registry = RegistryBuilder::new()
///     .handler("ms.user.get", |ctx| async move {
///         Ok(json!({ "id": ctx.raw_input()["id"] }))
///     })
///     .handler_with(
///         "ms.user.create",
///         HandlerOptions::new(3, Duration::from_millis(500)),
///         |_ctx| async { Ok(json!({ "created": true })) },
///     )
///     .seal()
///     .unwrap();
///
/// assert_eq!(registry.topics(), vec!["ms.user.create", "ms.user.get"]);
/// ```
pub struct RegistryBuilder {
    entries: Vec<HandlerEntry>,
    defaults: HandlerOptions,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            defaults: HandlerOptions::default(),
        }
    }

    /// Retry policy used by `handler` and `handler_guarded`.
    pub fn with_defaults(mut self, defaults: HandlerOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Register a handler with the default retry policy.
    pub fn handler<F, Fut>(self, topic: &str, handler: F) -> Self
    where
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let options = self.defaults;
        self.handler_with(topic, options, handler)
    }

    /// Register a handler with its own retry policy.
    pub fn handler_with<F, Fut>(mut self, topic: &str, options: HandlerOptions, handler: F) -> Self
    where
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.push(HandlerEntry::new(topic, options, handler));
        self
    }

    /// Register a handler with a guard function.
    ///
    /// The guard is called before the handler. If it returns `false`, the
    /// message is answered with `VALIDATION_ERROR` and not retried.
    pub fn handler_guarded<G, F, Fut>(mut self, topic: &str, guard: G, handler: F) -> Self
    where
        G: Fn(&MessageContext) -> bool + Send + Sync + 'static,
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let entry = HandlerEntry::new(topic, self.defaults, handler).with_guard(guard);
        self.push(entry);
        self
    }

    fn push(&mut self, entry: HandlerEntry) {
        if self.entries.iter().any(|e| e.topic() == entry.topic()) {
            warn!(
                topic = entry.topic(),
                "duplicate handler registration; the last one registered wins"
            );
        }
        self.entries.push(entry);
    }

    /// Validate all registrations and freeze the index.
    pub fn seal(self) -> Result<HandlerRegistry, RegistryError> {
        let mut handlers = HashMap::with_capacity(self.entries.len());
        for entry in self.entries {
            topic::validate(entry.topic())
                .map_err(|_| RegistryError::InvalidTopic(entry.topic().to_string()))?;
            if topic::is_dead_letter(entry.topic()) || topic::is_reply(entry.topic()) {
                return Err(RegistryError::DerivedTopic(entry.topic().to_string()));
            }
            debug!(topic = entry.topic(), options = ?entry.options(), "handler registered");
            handlers.insert(entry.topic().to_string(), Arc::new(entry));
        }
        Ok(HandlerRegistry { handlers })
    }
}

/// The sealed topic → handler index. Read-only for the process lifetime.
#[derive(Debug)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<HandlerEntry>>,
}

impl HandlerRegistry {
    /// Look up the handler for a topic.
    pub fn get(&self, topic: &str) -> Option<Arc<HandlerEntry>> {
        self.handlers.get(topic).cloned()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.handlers.contains_key(topic)
    }

    /// Registered topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
