//! # Event Subscriber
//!
//! Defines the subscription side of the event bus: the interface
//! collaborators register handlers through, and a stream adapter for
//! consumers that prefer pulling envelopes over callbacks.

use crate::error::BusError;
use crate::publisher::{EventBus, Unsubscriber};
use crate::subscription::{done, Envelope, Handler, SubscribeOptions};
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Trait for registering handlers on the bus.
pub trait EventSubscriber: Send + Sync {
    /// Subscribe `handler` to `topic` (exact or `"ns:*"`).
    fn subscribe(
        &self,
        topic: &str,
        handler: Handler,
        options: SubscribeOptions,
    ) -> Result<Unsubscriber, BusError>;

    /// Subscribe `handler` to every topic.
    fn subscribe_any(&self, handler: Handler, options: SubscribeOptions) -> Unsubscriber;
}

impl EventSubscriber for EventBus {
    fn subscribe(
        &self,
        topic: &str,
        handler: Handler,
        options: SubscribeOptions,
    ) -> Result<Unsubscriber, BusError> {
        self.subscribe_with(topic, handler, options)
    }

    fn subscribe_any(&self, handler: Handler, options: SubscribeOptions) -> Unsubscriber {
        self.subscribe_any_with(handler, options)
    }
}

/// Envelopes delivered to a channel-backed subscription.
///
/// Implements `tokio_stream::Stream`. The buffer is bounded: envelopes
/// published while it is full are dropped and counted in [`dropped`].
/// When dropped, the subscription is removed from the bus.
///
/// [`dropped`]: EventStream::dropped
pub struct EventStream {
    inner: ReceiverStream<Envelope>,
    dropped: Arc<AtomicU64>,
    subscription: Option<Unsubscriber>,
}

impl EventStream {
    /// A forwarding handler and the receiving half it feeds.
    fn channel(capacity: usize) -> (Handler, ReceiverStream<Envelope>, Arc<AtomicU64>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let counter = dropped.clone();
        let handler = Handler::sync(move |_, envelope| {
            match tx.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(envelope)) => {
                    let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(topic = %envelope.topic, dropped = total, "Event stream full, envelope dropped");
                }
                // Receiver gone means the stream is being dropped.
                Err(TrySendError::Closed(_)) => {}
            }
            done()
        });
        (handler, ReceiverStream::new(rx), dropped)
    }

    fn new(inner: ReceiverStream<Envelope>, dropped: Arc<AtomicU64>, subscription: Unsubscriber) -> Self {
        Self {
            inner,
            dropped,
            subscription: Some(subscription),
        }
    }

    /// Receive the next envelope, or `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inner.as_mut().recv().await
    }

    /// Try to receive an envelope without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.inner.as_mut().try_recv().ok()
    }

    /// Envelopes discarded because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Stream for EventStream {
    type Item = Envelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            let id = subscription.id();
            subscription.unsubscribe();
            debug!(subscription = %id, dropped = self.dropped(), "Event stream dropped");
        }
    }
}

impl EventBus {
    /// Stream every envelope published to `topic` (exact or `"ns:*"`).
    pub fn stream(&self, topic: &str) -> Result<EventStream, BusError> {
        self.stream_with(topic, SubscribeOptions::default(), DEFAULT_CHANNEL_CAPACITY)
    }

    /// Like [`stream`](Self::stream) with explicit options and buffer size.
    pub fn stream_with(
        &self,
        topic: &str,
        options: SubscribeOptions,
        capacity: usize,
    ) -> Result<EventStream, BusError> {
        let (handler, inner, dropped) = EventStream::channel(capacity);
        let subscription = self.subscribe_with(topic, handler, options)?;
        Ok(EventStream::new(inner, dropped, subscription))
    }

    /// Stream every envelope published on the bus.
    pub fn stream_any(&self) -> EventStream {
        let (handler, inner, dropped) = EventStream::channel(DEFAULT_CHANNEL_CAPACITY);
        let subscription = self.subscribe_any_with(handler, SubscribeOptions::default());
        EventStream::new(inner, dropped, subscription)
    }
}
