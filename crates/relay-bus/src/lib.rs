//! # Relay Bus - In-Process Publish/Subscribe
//!
//! Decouples components of a single process by topic. Publishers never hold
//! references to subscribers; subscribers never know who published.
//!
//! ## Topic Matching
//!
//! - **Exact:** `"user:login"` receives only `"user:login"`
//! - **Namespace:** `"chat:*"` receives every topic starting with `"chat:"`
//! - **Wildcard:** `subscribe_any` receives every topic
//!
//! ## Dispatch
//!
//! ```text
//!                   ┌────────────────────────────┐
//!  publish(topic) ─→│  EventBus                   │
//!                   │   ├─ history ring (bounded) │
//!                   │   └─ registry snapshot ─────┼──┐
//!                   └────────────────────────────┘  │
//!                                                   ▼
//!                   ┌────────────────────────────────────┐
//!                   │ Dispatcher                          │
//!                   │  wildcard + exact + namespace       │
//!                   │  stable sort by priority (desc)     │
//!                   │  once: claim → invoke → retire      │
//!                   └────────────────────────────────────┘
//!                        │            │            │
//!                        ▼            ▼            ▼
//!                    handler A    handler B    handler C
//! ```
//!
//! A failing or panicking handler is logged and counted; the remaining
//! handlers still run and the publisher never sees the failure.
//!
//! ## Example
//!
//! ```
//! use relay_bus::{done, EventBus, Handler};
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//! bus.subscribe("user:login", Handler::sync(|data, _| {
//!     assert_eq!(data["name"], "ada");
//!     done()
//! }))?;
//!
//! assert_eq!(bus.publish("user:login", json!({"name": "ada"}))?, 1);
//! # Ok::<(), relay_bus::BusError>(())
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod matcher;
pub mod metrics;
pub mod publisher;
pub mod registry;
pub mod subscriber;
pub mod subscription;

// Re-export main types
pub use bridge::{forward_external, forward_marked, BridgeAdapter, BridgeInput, ExternalEvent, MarkedAction};
pub use config::{BusConfig, ConfigStore, InMemoryConfigStore, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_LISTENERS};
pub use error::{BusError, HandlerError, HandlerResult};
pub use history::{HistoryEntry, ReplayFilter};
pub use matcher::{TopicPattern, NAMESPACE_SUFFIX};
pub use metrics::{BusStats, MetricsSnapshot};
pub use publisher::{Emission, EmissionMode, EventBus, EventPublisher, PublishOptions, Unsubscriber};
pub use subscriber::{EventStream, EventSubscriber};
pub use subscription::{
    done, Envelope, Handler, HandlerOutcome, SubscribeOptions, SubscriberRef, SubscriptionId,
};

/// Default buffer size for [`EventStream`] subscriptions.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
