//! # Boundary Bridges
//!
//! Thin adapters that translate events from outside the bus into `publish`
//! calls. They are not part of the dispatcher contract; they only hold an
//! [`EventPublisher`].
//!
//! - [`ExternalEvent`]: a named event dispatched by the host (`{type, data}`)
//! - [`MarkedAction`]: a user action on an element carrying an event marker
//!
//! ```ignore
//! let bus = EventBus::new();
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! let adapter = Arc::new(BridgeAdapter::new(Arc::new(bus.clone())));
//! tokio::spawn(adapter.run(rx));
//!
//! tx.send(BridgeInput::External(ExternalEvent::new("app:ready", json!({})))).await?;
//! ```

use crate::error::BusError;
use crate::publisher::EventPublisher;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A host-level named event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    /// Topic to publish; events without one are ignored.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl ExternalEvent {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: Some(kind.into()),
            data,
        }
    }
}

/// A user action on an element that may carry an event marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkedAction {
    /// Value of the element's event marker, used as the topic.
    pub marker: Option<String>,
    /// Description of the element acted on.
    pub element: Value,
    /// The raw action as the host reported it.
    pub origin: Value,
}

/// Anything the bridge accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeInput {
    External(ExternalEvent),
    Marked(MarkedAction),
}

/// Publish an external event. Returns `Ok(None)` when it has no topic.
pub fn forward_external(
    publisher: &dyn EventPublisher,
    event: ExternalEvent,
) -> Result<Option<usize>, BusError> {
    match event.kind {
        Some(kind) if !kind.is_empty() => publisher.publish(&kind, event.data).map(Some),
        _ => Ok(None),
    }
}

/// Publish a marked action as `{ element, originalEvent }` under its marker.
/// Returns `Ok(None)` when the element carries no marker.
pub fn forward_marked(
    publisher: &dyn EventPublisher,
    action: MarkedAction,
) -> Result<Option<usize>, BusError> {
    match action.marker {
        Some(marker) if !marker.is_empty() => {
            let payload = json!({
                "element": action.element,
                "originalEvent": action.origin,
            });
            publisher.publish(&marker, payload).map(Some)
        }
        _ => Ok(None),
    }
}

/// Consumes bridge inputs from a channel and forwards them to the bus.
pub struct BridgeAdapter {
    publisher: Arc<dyn EventPublisher>,
    forwarded: AtomicU64,
    ignored: AtomicU64,
}

impl BridgeAdapter {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher,
            forwarded: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Forward one input.
    pub fn handle(&self, input: BridgeInput) -> Result<Option<usize>, BusError> {
        let result = match input {
            BridgeInput::External(event) => forward_external(self.publisher.as_ref(), event),
            BridgeInput::Marked(action) => forward_marked(self.publisher.as_ref(), action),
        };
        match &result {
            Ok(Some(_)) => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                self.ignored.fetch_add(1, Ordering::Relaxed);
                debug!("Bridge input without a topic ignored");
            }
            Err(_) => {}
        }
        result
    }

    /// Forward inputs until the channel closes.
    ///
    /// This should be spawned as a background task.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<BridgeInput>) {
        info!("[BridgeAdapter] Started forwarding events");
        while let Some(input) = rx.recv().await {
            if let Err(e) = self.handle(input) {
                warn!(error = %e, "Bridge input rejected");
            }
        }
        info!(
            forwarded = self.forwarded(),
            "[BridgeAdapter] Input channel closed, shutting down"
        );
    }

    #[must_use]
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }
}
