//! # Dispatcher
//!
//! Orders the candidate subscriptions for one publish and invokes them with
//! failure isolation.
//!
//! ## Ordering
//!
//! Candidates arrive in source order (wildcard, exact, namespace). They are
//! sorted once by `(priority desc, source index asc)`, so ties fall back to
//! source order and then to registration order within a source.
//!
//! ## Emission modes
//!
//! - **Sync**: handlers run one after another on the caller's thread. Future
//!   handlers are spawned on the current Tokio runtime and not awaited.
//! - **Async**: subscriptions not flagged `is_async` are invoked immediately in
//!   order; flagged ones are deferred onto the current Tokio runtime.
//!   Everything is then joined, and the outcomes come back in dispatch order.
//!   Dropping the join does not stop deferred handlers from running.
//!
//! A `once` subscription is claimed before it runs and removed from the
//! registry right after it is invoked, whatever the outcome.

use crate::error::{HandlerError, HandlerResult};
use crate::metrics::BusMetrics;
use crate::registry::SubscriptionRegistry;
use crate::subscription::{Envelope, Handler, HandlerOutcome, SubscriberRef, Subscription};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error};

/// Result of calling a handler: finished, or a future still to await.
enum Invocation {
    Ready(HandlerResult),
    Pending(BoxFuture<'static, HandlerResult>),
}

/// Call a handler, turning panics into [`HandlerError::Panicked`].
fn invoke(handler: &Handler, envelope: &Envelope) -> Invocation {
    match handler {
        Handler::Sync(f) => Invocation::Ready(
            catch_unwind(AssertUnwindSafe(|| f(&envelope.data, envelope)))
                .unwrap_or_else(|payload| Err(HandlerError::from_panic(payload))),
        ),
        Handler::Async(f) => {
            match catch_unwind(AssertUnwindSafe(|| f(envelope.data.clone(), envelope.clone()))) {
                Ok(fut) => Invocation::Pending(
                    AssertUnwindSafe(fut)
                        .catch_unwind()
                        .map(|r| r.unwrap_or_else(|payload| Err(HandlerError::from_panic(payload))))
                        .boxed(),
                ),
                Err(payload) => Invocation::Ready(Err(HandlerError::from_panic(payload))),
            }
        }
    }
}

/// Stable sort by priority descending, then by position in `candidates`.
#[must_use]
pub fn dispatch_order(candidates: Vec<Arc<Subscription>>) -> Vec<Arc<Subscription>> {
    let mut indexed: Vec<(usize, Arc<Subscription>)> = candidates.into_iter().enumerate().collect();
    indexed.sort_by(|(slot_a, a), (slot_b, b)| {
        b.priority.cmp(&a.priority).then_with(|| slot_a.cmp(slot_b))
    });
    indexed.into_iter().map(|(_, sub)| sub).collect()
}

/// Runs dispatch passes against a shared registry.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    registry: Arc<RwLock<SubscriptionRegistry>>,
    metrics: Arc<BusMetrics>,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<RwLock<SubscriptionRegistry>>, metrics: Arc<BusMetrics>) -> Self {
        Self { registry, metrics }
    }

    /// Ordered candidates. The read guard is released before returning.
    fn candidates(&self, topic: &str) -> Vec<Arc<Subscription>> {
        let collected = self.registry.read().collect(topic);
        dispatch_order(collected)
    }

    /// Remove a fired `once` subscription from its owning store.
    fn retire(&self, sub: &Subscription) {
        if sub.once {
            let removed = self
                .registry
                .write()
                .remove(&sub.owner, &SubscriberRef::Id(sub.id));
            if removed.is_some() {
                debug!(subscription = %sub.id, "Once subscription removed after firing");
            }
        }
    }

    /// Record the outcome of one handler. Failures are logged, never raised.
    fn settle(&self, topic: &str, sub: &Subscription, result: HandlerResult) -> HandlerOutcome {
        if let Err(e) = &result {
            error!(topic = %topic, subscription = %sub.id, error = %e, "Handler error");
        }
        self.metrics.record_invocation(result.is_err());
        HandlerOutcome {
            subscription_id: sub.id,
            result,
        }
    }

    /// Synchronous pass. Returns the number of handlers invoked.
    pub(crate) fn dispatch_sync(&self, envelope: &Envelope) -> usize {
        let mut invoked = 0;
        for sub in self.candidates(&envelope.topic) {
            if !sub.claim() {
                continue;
            }
            let invocation = invoke(&sub.handler, envelope);
            self.retire(&sub);
            invoked += 1;

            match invocation {
                Invocation::Ready(result) => {
                    self.settle(&envelope.topic, &sub, result);
                }
                Invocation::Pending(fut) => self.spawn_detached(&envelope.topic, sub, fut),
            }
        }
        invoked
    }

    /// Run a future handler in the background; the sync path does not wait for it.
    fn spawn_detached(&self, topic: &str, sub: Arc<Subscription>, fut: BoxFuture<'static, HandlerResult>) {
        match Handle::try_current() {
            Ok(handle) => {
                let dispatcher = self.clone();
                let topic = topic.to_string();
                handle.spawn(async move {
                    let result = fut.await;
                    dispatcher.settle(&topic, &sub, result);
                });
            }
            Err(_) => {
                self.settle(topic, &sub, Err(HandlerError::NoRuntime));
            }
        }
    }

    /// Asynchronous pass. Non-deferred handlers run before this returns; the
    /// returned future resolves once every handler has finished.
    ///
    /// Inside a Tokio runtime, deferred handlers and unfinished futures are
    /// spawned, so they still complete if the returned future is dropped.
    /// Without a runtime, deferred subscriptions are only claimed once the
    /// returned future is polled.
    pub(crate) fn dispatch_async(&self, envelope: Envelope) -> BoxFuture<'static, Vec<HandlerOutcome>> {
        let envelope = Arc::new(envelope);
        let runtime = Handle::try_current().ok();
        let mut pending: Vec<BoxFuture<'static, Option<HandlerOutcome>>> = Vec::new();

        for sub in self.candidates(&envelope.topic) {
            if sub.is_async {
                match &runtime {
                    Some(handle) => {
                        if !sub.claim() {
                            continue;
                        }
                        let work = self.deferred(Arc::clone(&sub), Arc::clone(&envelope));
                        pending.push(self.spawn_joined(handle, &envelope.topic, sub, work));
                    }
                    None => {
                        let work = self.deferred(Arc::clone(&sub), Arc::clone(&envelope));
                        pending.push(
                            async move {
                                if !sub.claim() {
                                    return None;
                                }
                                Some(work.await)
                            }
                            .boxed(),
                        );
                    }
                }
                continue;
            }

            if !sub.claim() {
                continue;
            }
            let invocation = invoke(&sub.handler, &envelope);
            self.retire(&sub);
            match invocation {
                Invocation::Ready(result) => {
                    let outcome = self.settle(&envelope.topic, &sub, result);
                    pending.push(future::ready(Some(outcome)).boxed());
                }
                Invocation::Pending(fut) => {
                    let dispatcher = self.clone();
                    let topic = envelope.topic.clone();
                    let sub_ref = Arc::clone(&sub);
                    let work = async move {
                        let result = fut.await;
                        dispatcher.settle(&topic, &sub_ref, result)
                    }
                    .boxed();
                    match &runtime {
                        Some(handle) => pending.push(self.spawn_joined(handle, &envelope.topic, sub, work)),
                        None => pending.push(work.map(Some).boxed()),
                    }
                }
            }
        }

        async move { future::join_all(pending).await.into_iter().flatten().collect() }.boxed()
    }

    /// Invoke, retire and settle an already claimed deferred subscription.
    fn deferred(&self, sub: Arc<Subscription>, envelope: Arc<Envelope>) -> BoxFuture<'static, HandlerOutcome> {
        let dispatcher = self.clone();
        async move {
            let invocation = invoke(&sub.handler, &envelope);
            dispatcher.retire(&sub);
            let result = match invocation {
                Invocation::Ready(result) => result,
                Invocation::Pending(fut) => fut.await,
            };
            dispatcher.settle(&envelope.topic, &sub, result)
        }
        .boxed()
    }

    /// Spawn `work` and return a future joining it.
    fn spawn_joined(
        &self,
        handle: &Handle,
        topic: &str,
        sub: Arc<Subscription>,
        work: BoxFuture<'static, HandlerOutcome>,
    ) -> BoxFuture<'static, Option<HandlerOutcome>> {
        let task = handle.spawn(work);
        let dispatcher = self.clone();
        let topic = topic.to_string();
        async move {
            match task.await {
                Ok(outcome) => Some(outcome),
                // Only reachable when the runtime shuts down under the task.
                Err(e) => Some(dispatcher.settle(
                    &topic,
                    &sub,
                    Err(HandlerError::failed(format!("handler task aborted: {e}"))),
                )),
            }
        }
        .boxed()
    }
}
