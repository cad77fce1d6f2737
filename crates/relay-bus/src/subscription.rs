//! # Subscriptions
//!
//! Handler values, subscription records and the envelope every handler
//! receives.

use crate::error::HandlerResult;
use crate::matcher::TopicPattern;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// Opaque identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The event object delivered to every handler.
///
/// Created fresh for each publish and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Topic the event was published to.
    pub topic: String,
    /// Payload supplied by the publisher.
    pub data: Value,
    /// When the publish happened.
    pub timestamp: SystemTime,
    /// Unique id of this publish.
    pub id: Uuid,
}

impl Envelope {
    pub(crate) fn new(topic: &str, data: Value) -> Self {
        Self {
            topic: topic.to_string(),
            data,
            timestamp: SystemTime::now(),
            id: Uuid::new_v4(),
        }
    }
}

type SyncFn = dyn Fn(&Value, &Envelope) -> HandlerResult + Send + Sync;
type AsyncFn = dyn Fn(Value, Envelope) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A subscriber callback taking `(payload, envelope)`.
///
/// Cloning a handler shares the underlying function, so a clone can later be
/// used to unsubscribe by identity.
#[derive(Clone)]
pub enum Handler {
    /// Runs to completion on the dispatching thread.
    Sync(Arc<SyncFn>),
    /// Produces a future; awaited on the async path, spawned on the sync path.
    Async(Arc<AsyncFn>),
}

impl Handler {
    /// Wrap a plain function.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Value, &Envelope) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wrap a function returning a future.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |data, envelope| Box::pin(f(data, envelope))))
    }

    /// Whether both handles point at the same function.
    #[must_use]
    pub fn same_as(&self, other: &Handler) -> bool {
        match (self, other) {
            (Self::Sync(a), Self::Sync(b)) => Arc::ptr_eq(a, b),
            (Self::Async(a), Self::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_future(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// Handler result for "nothing to report".
#[must_use]
pub fn done() -> HandlerResult {
    Ok(Value::Null)
}

/// Options accepted by `subscribe_with` / `subscribe_any_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Higher fires first. Ties keep registration order.
    pub priority: i32,
    /// Remove the subscription after its first invocation.
    pub once: bool,
    /// Deferred and awaited on the async path. `None` takes the bus default.
    pub is_async: Option<bool>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.is_async = Some(is_async);
        self
    }
}

/// Which store owns a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionOwner {
    /// Registered through `subscribe_any`.
    Wildcard,
    /// Registered under an exact topic.
    Exact(String),
    /// Registered under `"<prefix>:*"`; holds the prefix.
    Namespace(String),
}

impl From<TopicPattern> for SubscriptionOwner {
    fn from(pattern: TopicPattern) -> Self {
        match pattern {
            TopicPattern::Exact(topic) => Self::Exact(topic),
            TopicPattern::Namespace(prefix) => Self::Namespace(prefix),
        }
    }
}

/// A registered handler plus its dispatch attributes.
///
/// Owned by the registry. The dispatcher only holds shared references for
/// the duration of a publish.
#[derive(Debug)]
pub struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) owner: SubscriptionOwner,
    pub(crate) handler: Handler,
    pub(crate) priority: i32,
    pub(crate) once: bool,
    pub(crate) is_async: bool,
    fired: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        owner: SubscriptionOwner,
        handler: Handler,
        priority: i32,
        once: bool,
        is_async: bool,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            owner,
            handler,
            priority,
            once,
            is_async,
            fired: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> &SubscriptionOwner {
        &self.owner
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn is_once(&self) -> bool {
        self.once
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Claim the right to fire. Always succeeds for persistent subscriptions;
    /// succeeds exactly once for `once` subscriptions.
    pub(crate) fn claim(&self) -> bool {
        !self.once || !self.fired.swap(true, Ordering::AcqRel)
    }
}

/// How to identify a subscription to remove.
#[derive(Debug, Clone)]
pub enum SubscriberRef {
    Id(SubscriptionId),
    Handler(Handler),
}

impl SubscriberRef {
    pub(crate) fn matches(&self, subscription: &Subscription) -> bool {
        match self {
            Self::Id(id) => subscription.id == *id,
            Self::Handler(handler) => subscription.handler.same_as(handler),
        }
    }
}

impl From<SubscriptionId> for SubscriberRef {
    fn from(id: SubscriptionId) -> Self {
        Self::Id(id)
    }
}

impl From<Handler> for SubscriberRef {
    fn from(handler: Handler) -> Self {
        Self::Handler(handler)
    }
}

impl From<&Handler> for SubscriberRef {
    fn from(handler: &Handler) -> Self {
        Self::Handler(handler.clone())
    }
}

/// Result of one handler on the async path.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub subscription_id: SubscriptionId,
    pub result: HandlerResult,
}
