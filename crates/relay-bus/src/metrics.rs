//! Counters for bus activity.
//!
//! Read-only views for debugging tools built on top of the bus. Reading them
//! never changes dispatch behavior.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bus-wide activity counters.
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// Total publish calls, replays included
    pub events_published: AtomicU64,
    /// Total handler invocations
    pub handlers_invoked: AtomicU64,
    /// Handlers that returned an error or panicked
    pub handler_failures: AtomicU64,
    /// Subscriptions registered past the soft listener cap
    pub capacity_warnings: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invocation(&self, failed: bool) {
        self.handlers_invoked.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.handler_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_capacity_warning(&self) {
        self.capacity_warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            handlers_invoked: self.handlers_invoked.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            capacity_warnings: self.capacity_warnings.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub handlers_invoked: u64,
    pub handler_failures: u64,
    pub capacity_warnings: u64,
}

/// Per-topic publish counters.
#[derive(Debug, Default)]
pub struct PublishCounters {
    counts: Mutex<HashMap<String, u64>>,
}

impl PublishCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, topic: &str) {
        let mut counts = self.counts.lock();
        match counts.get_mut(topic) {
            Some(count) => *count += 1,
            None => {
                counts.insert(topic.to_string(), 1);
            }
        }
    }

    #[must_use]
    pub fn get(&self, topic: &str) -> u64 {
        self.counts.lock().get(topic).copied().unwrap_or(0)
    }

    /// All counters, highest count first; ties ordered by topic.
    #[must_use]
    pub fn ranked(&self) -> Vec<(String, u64)> {
        let mut ranked: Vec<(String, u64)> = self
            .counts
            .lock()
            .iter()
            .map(|(topic, count)| (topic.clone(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn clear(&self) {
        self.counts.lock().clear();
    }
}

/// Summary of bus state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Entries currently held in history
    pub history_len: usize,
    /// Subscriptions of every kind
    pub total_listeners: usize,
    /// Topics with at least one direct subscription
    pub topic_count: usize,
    /// Total publish calls
    pub events_published: u64,
}
