//! # Event Bus
//!
//! The bus object collaborators are handed at construction time, and the
//! publishing interface they depend on.
//!
//! ## Control flow
//!
//! ```text
//! subscribe(topic, handler, opts) ──► registry (write lock)
//!
//! publish(topic, data, opts)
//!     ├── history.record(...)            (history lock)
//!     ├── counters.increment(topic)
//!     ├── registry.collect(topic)        (read lock, released)
//!     └── dispatcher: sort, invoke, prune once-subscriptions
//! ```

use crate::config::BusConfig;
use crate::dispatcher::Dispatcher;
use crate::error::BusError;
use crate::history::{EventHistory, HistoryEntry, ReplayFilter};
use crate::matcher::TopicPattern;
use crate::metrics::{BusMetrics, BusStats, MetricsSnapshot, PublishCounters};
use crate::registry::SubscriptionRegistry;
use crate::subscription::{
    Envelope, Handler, HandlerOutcome, SubscribeOptions, SubscriberRef, Subscription,
    SubscriptionId, SubscriptionOwner,
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Trait for publishing events to the bus.
///
/// Collaborators that only emit events should depend on this rather than on
/// [`EventBus`] directly.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish synchronously.
    ///
    /// # Returns
    ///
    /// The number of handlers invoked.
    fn publish(&self, topic: &str, data: Value) -> Result<usize, BusError>;

    /// Publish with concurrent fan-out and wait for every handler.
    async fn publish_async(&self, topic: &str, data: Value) -> Result<Vec<HandlerOutcome>, BusError>;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// How a publish delivers to its handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmissionMode {
    /// Handlers run in order on the calling thread.
    #[default]
    Sync,
    /// Handlers fan out concurrently and are joined.
    Async,
}

/// Options accepted by the `*_with` publish variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    pub mode: EmissionMode,
    /// Append the event to history. Replays turn this off.
    pub record_history: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            mode: EmissionMode::Sync,
            record_history: true,
        }
    }
}

impl PublishOptions {
    pub fn asynchronous() -> Self {
        Self {
            mode: EmissionMode::Async,
            ..Self::default()
        }
    }

    pub fn without_history(mut self) -> Self {
        self.record_history = false;
        self
    }
}

/// Result of [`EventBus::publish_with`].
#[must_use = "an async emission only reports outcomes when awaited"]
pub enum Emission {
    /// Sync mode finished; holds the number of handlers invoked.
    Delivered(usize),
    /// Async mode; resolves once every handler has completed or failed.
    Pending(BoxFuture<'static, Vec<HandlerOutcome>>),
}

impl Emission {
    /// Wait for async handlers. A sync emission resolves immediately with no
    /// outcomes.
    pub async fn wait(self) -> Vec<HandlerOutcome> {
        match self {
            Self::Delivered(_) => Vec::new(),
            Self::Pending(fut) => fut.await,
        }
    }
}

/// Capability to remove exactly one subscription.
///
/// Dropping it leaves the subscription in place.
#[derive(Debug, Clone)]
pub struct Unsubscriber {
    registry: Weak<RwLock<SubscriptionRegistry>>,
    owner: SubscriptionOwner,
    id: SubscriptionId,
    topic: String,
    debug: bool,
}

impl Unsubscriber {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let removed = registry
            .write()
            .remove(&self.owner, &SubscriberRef::Id(self.id))
            .is_some();
        if removed && self.debug {
            debug!(topic = %self.topic, "Unsubscribed");
        }
        removed
    }
}

/// In-process publish/subscribe dispatcher.
///
/// Cloning is cheap and every clone shares the same state. Construct one per
/// application and pass it to each collaborator.
#[derive(Clone)]
pub struct EventBus {
    config: Arc<BusConfig>,
    registry: Arc<RwLock<SubscriptionRegistry>>,
    history: Arc<EventHistory>,
    counters: Arc<PublishCounters>,
    metrics: Arc<BusMetrics>,
    dispatcher: Dispatcher,
}

impl EventBus {
    /// Create a bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(BusConfig::default())
    }

    /// Create a bus with validated configuration.
    pub fn with_config(config: BusConfig) -> Result<Self, BusError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: BusConfig) -> Self {
        let registry = Arc::new(RwLock::new(SubscriptionRegistry::new()));
        let metrics = Arc::new(BusMetrics::new());
        let history = Arc::new(EventHistory::with_capacity(config.history_capacity));
        debug!(
            max_listeners = config.max_listeners,
            history_capacity = config.history_capacity,
            "Event bus created"
        );
        Self {
            dispatcher: Dispatcher::new(registry.clone(), metrics.clone()),
            config: Arc::new(config),
            registry,
            history,
            counters: Arc::new(PublishCounters::new()),
            metrics,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Subscription
    // ---------------------------------------------------------------------

    /// Subscribe `handler` to `topic` with default options.
    pub fn subscribe(&self, topic: &str, handler: Handler) -> Result<Unsubscriber, BusError> {
        self.subscribe_with(topic, handler, SubscribeOptions::default())
    }

    /// Subscribe `handler` to `topic`.
    ///
    /// `topic` may be exact (`"chat:message"`) or a namespace (`"chat:*"`).
    /// Registering past `max_listeners` only logs a warning.
    pub fn subscribe_with(
        &self,
        topic: &str,
        handler: Handler,
        options: SubscribeOptions,
    ) -> Result<Unsubscriber, BusError> {
        if topic.is_empty() {
            return Err(BusError::InvalidSubscription {
                reason: "topic must not be empty".to_string(),
            });
        }
        let owner = TopicPattern::parse(topic).into();
        Ok(self.register(owner, topic, handler, options))
    }

    /// Subscribe for a single delivery.
    pub fn once(
        &self,
        topic: &str,
        handler: Handler,
        options: SubscribeOptions,
    ) -> Result<Unsubscriber, BusError> {
        self.subscribe_with(topic, handler, options.once())
    }

    /// Subscribe to every topic with default options.
    pub fn subscribe_any(&self, handler: Handler) -> Unsubscriber {
        self.subscribe_any_with(handler, SubscribeOptions::default())
    }

    /// Subscribe to every topic.
    pub fn subscribe_any_with(&self, handler: Handler, options: SubscribeOptions) -> Unsubscriber {
        self.register(SubscriptionOwner::Wildcard, "*", handler, options)
    }

    fn register(
        &self,
        owner: SubscriptionOwner,
        label: &str,
        handler: Handler,
        options: SubscribeOptions,
    ) -> Unsubscriber {
        let is_async = options.is_async.unwrap_or(self.config.async_default);
        let subscription = Arc::new(Subscription::new(
            owner.clone(),
            handler,
            options.priority,
            options.once,
            is_async,
        ));
        let id = subscription.id();

        let existing = self.registry.write().insert(subscription);

        if existing >= self.config.max_listeners {
            self.metrics.record_capacity_warning();
            warn!(
                topic = %label,
                listeners = existing + 1,
                max_listeners = self.config.max_listeners,
                "Max listeners reached"
            );
        }
        if self.config.debug {
            debug!(topic = %label, subscription = %id, "Subscribed");
        }

        Unsubscriber {
            registry: Arc::downgrade(&self.registry),
            owner,
            id,
            topic: label.to_string(),
            debug: self.config.debug,
        }
    }

    /// Remove the first subscription on `topic` matching `target`.
    ///
    /// Absent subscriptions are not an error.
    pub fn unsubscribe(&self, topic: &str, target: impl Into<SubscriberRef>) -> bool {
        let owner: SubscriptionOwner = TopicPattern::parse(topic).into();
        let removed = self.registry.write().remove(&owner, &target.into()).is_some();
        if removed && self.config.debug {
            debug!(topic = %topic, "Unsubscribed");
        }
        removed
    }

    /// Remove the first wildcard subscription matching `target`.
    pub fn unsubscribe_any(&self, target: impl Into<SubscriberRef>) -> bool {
        let removed = self
            .registry
            .write()
            .remove(&SubscriptionOwner::Wildcard, &target.into())
            .is_some();
        if removed && self.config.debug {
            debug!(topic = "*", "Unsubscribed");
        }
        removed
    }

    /// Clear one topic's subscriptions, or everything (wildcards included)
    /// when `topic` is `None`. Returns the number removed.
    pub fn unsubscribe_all(&self, topic: Option<&str>) -> usize {
        let removed = match topic {
            Some(topic) => self.registry.write().remove_topic(topic),
            None => self.registry.write().clear(),
        };
        if self.config.debug {
            debug!(topic = ?topic, removed, "Removed subscriptions");
        }
        removed
    }

    /// Tear down: drop every subscription.
    pub fn shutdown(&self) {
        let removed = self.registry.write().clear();
        info!(removed, "Event bus shut down");
    }

    // ---------------------------------------------------------------------
    // Publishing
    // ---------------------------------------------------------------------

    /// Publish synchronously, recording history.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, topic: &str, data: Value) -> Result<usize, BusError> {
        self.publish_sync(topic, data, true)
    }

    /// Publish in the mode named by `options`.
    ///
    /// Non-deferred handlers have already run when this returns, in either
    /// mode. In async mode the [`Emission`] resolves to every handler's
    /// outcome; dropping it does not cancel deferred handlers.
    pub fn publish_with(&self, topic: &str, data: Value, options: PublishOptions) -> Result<Emission, BusError> {
        let envelope = self.prepare(topic, data, options.record_history)?;
        Ok(match options.mode {
            EmissionMode::Sync => Emission::Delivered(self.dispatcher.dispatch_sync(&envelope)),
            EmissionMode::Async => Emission::Pending(self.dispatcher.dispatch_async(envelope)),
        })
    }

    /// Publish with concurrent fan-out and wait for all handlers.
    ///
    /// Outcomes are in dispatch order.
    pub async fn publish_async(&self, topic: &str, data: Value) -> Result<Vec<HandlerOutcome>, BusError> {
        Ok(self
            .publish_with(topic, data, PublishOptions::asynchronous())?
            .wait()
            .await)
    }

    fn publish_sync(&self, topic: &str, data: Value, record_history: bool) -> Result<usize, BusError> {
        let envelope = self.prepare(topic, data, record_history)?;
        Ok(self.dispatcher.dispatch_sync(&envelope))
    }

    /// Validate, record and count a publish, then build its envelope.
    fn prepare(&self, topic: &str, data: Value, record_history: bool) -> Result<Envelope, BusError> {
        if topic.is_empty() {
            return Err(BusError::InvalidTopic);
        }
        let envelope = Envelope::new(topic, data);

        if record_history {
            self.history
                .record(topic, envelope.data.clone(), envelope.timestamp);
        }
        self.counters.increment(topic);
        self.metrics.record_publish();

        if self.config.debug || self.config.log_events {
            info!(topic = %topic, event_id = %envelope.id, data = %envelope.data, "Emit");
        }
        Ok(envelope)
    }

    // ---------------------------------------------------------------------
    // History
    // ---------------------------------------------------------------------

    /// Re-publish recorded events selected by `filter`, oldest first, without
    /// recording them again. Returns the number replayed.
    pub fn replay(&self, filter: &ReplayFilter) -> usize {
        if filter.is_empty_window() {
            debug!(since = ?filter.since, until = ?filter.until, "Replay window is empty");
            return 0;
        }
        let entries = self.history.select(filter);
        let mut replayed = 0;
        for entry in entries {
            if self.publish_sync(&entry.topic, entry.data, false).is_ok() {
                replayed += 1;
            }
        }
        debug!(topic = ?filter.topic, replayed, "Replayed history");
        replayed
    }

    /// Copy of the history log, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.snapshot()
    }

    /// Up to `limit` most recent events, newest first.
    #[must_use]
    pub fn recent_events(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.recent(limit)
    }

    /// Clear history and publish counters.
    pub fn clear_history(&self) {
        self.history.clear();
        self.counters.clear();
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Wildcard plus direct subscribers of `topic`, or everything when `None`.
    #[must_use]
    pub fn listener_count(&self, topic: Option<&str>) -> usize {
        self.registry.read().listener_count(topic)
    }

    /// Topics with at least one direct subscription, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.registry.read().topics()
    }

    /// Alias of [`Self::event_names`].
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.event_names()
    }

    /// `(label, count)` rows: a `"*"` row for wildcards when present, then
    /// each topic.
    #[must_use]
    pub fn listener_summary(&self) -> Vec<(String, usize)> {
        let registry = self.registry.read();
        let mut rows = Vec::new();
        if registry.wildcard_count() > 0 {
            rows.push(("*".to_string(), registry.wildcard_count()));
        }
        for topic in registry.topics() {
            let count = registry.direct_count(&topic);
            rows.push((topic, count));
        }
        rows
    }

    /// How many times `topic` has been published.
    #[must_use]
    pub fn publish_count(&self, topic: &str) -> u64 {
        self.counters.get(topic)
    }

    /// Every publish counter, highest first.
    #[must_use]
    pub fn event_counts(&self) -> Vec<(String, u64)> {
        self.counters.ranked()
    }

    /// The `limit` most published topics.
    #[must_use]
    pub fn top_events(&self, limit: usize) -> Vec<(String, u64)> {
        let mut ranked = self.counters.ranked();
        ranked.truncate(limit);
        ranked
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        let registry = self.registry.read();
        BusStats {
            history_len: self.history.len(),
            total_listeners: registry.listener_count(None),
            topic_count: registry.topics().len(),
            events_published: self.metrics.snapshot().events_published,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    fn publish(&self, topic: &str, data: Value) -> Result<usize, BusError> {
        EventBus::publish(self, topic, data)
    }

    async fn publish_async(&self, topic: &str, data: Value) -> Result<Vec<HandlerOutcome>, BusError> {
        EventBus::publish_async(self, topic, data).await
    }

    fn events_published(&self) -> u64 {
        self.metrics.snapshot().events_published
    }
}
