//! Operation handlers and their registry.
//!
//! A handler's completion is its async return value: by construction it
//! completes exactly once, replacing the completion-callback contract with
//! one the compiler enforces. Post-response work goes into
//! [`HandlerOutcome::followup`], which the dispatcher spawns after the audit
//! record is finished.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::audit::CorrelationKey;

/// Transport-level request metadata passed through to handlers.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: http::Method,
    pub path: String,
    pub headers: http::HeaderMap,
}

/// Everything a handler receives for one call.
pub struct CallContext {
    /// Validated parameter payload.
    pub input: Map<String, Value>,
    /// Correlation key of the call's audit record.
    pub key: CorrelationKey,
    /// Raw request metadata.
    pub meta: RequestMeta,
}

/// Result of one handler invocation.
pub struct HandlerOutcome {
    /// Response body, emitted verbatim; opaque to the dispatcher.
    pub body: Value,
    /// Optional post-response work, spawned after the audit record is
    /// finished and the response is on its way out.
    pub followup: Option<BoxFuture<'static, ()>>,
}

impl HandlerOutcome {
    #[must_use]
    pub fn body(body: Value) -> Self {
        Self {
            body,
            followup: None,
        }
    }

    #[must_use]
    pub fn with_followup<F>(mut self, followup: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.followup = Some(Box::pin(followup));
        self
    }
}

impl From<Value> for HandlerOutcome {
    fn from(body: Value) -> Self {
        Self::body(body)
    }
}

/// A network-exposed operation's business logic.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn handle(&self, call: CallContext) -> HandlerOutcome;
}

/// Adapts an async closure into an [`OperationHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    FnHandler(f)
}

/// Closure-backed handler; construct via [`handler_fn`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> OperationHandler for FnHandler<F>
where
    F: Fn(CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    async fn handle(&self, call: CallContext) -> HandlerOutcome {
        (self.0)(call).await
    }
}

/// Operation name to its bound handler. Populated during the registration
/// phase; read-only once the server starts serving.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn OperationHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` under `name`. A repeated insert replaces the previous
    /// handler; schema authority is the store's concern, not the registry's.
    pub fn insert<H>(&self, name: &str, handler: H)
    where
        H: OperationHandler + 'static,
    {
        info!(operation = name, "handler registered");
        self.handlers.insert(name.to_string(), Arc::new(handler));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Names of all registered handlers.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
