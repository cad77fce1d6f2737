//! # Event History
//!
//! Bounded, oldest-evicting log of published events, and the filter used to
//! select entries for replay.
//!
//! The ring is guarded by its own lock, independent of the subscription
//! registry, because every publish writes to it regardless of subscribers.

use crate::matcher::history_filter_matches;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::SystemTime;

/// One recorded publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub topic: String,
    pub data: Value,
    pub timestamp: SystemTime,
}

/// Selects history entries for replay.
///
/// Time bounds are inclusive. A window with `since > until` selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayFilter {
    /// Exact topic, or a namespace root matching `"<topic>:<suffix>"`.
    pub topic: Option<String>,
    pub since: Option<SystemTime>,
    pub until: Option<SystemTime>,
}

impl ReplayFilter {
    /// A filter that selects every recorded entry.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn since(mut self, since: SystemTime) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn until(mut self, until: SystemTime) -> Self {
        self.until = Some(until);
        self
    }

    /// `true` when the time window cannot contain anything.
    #[must_use]
    pub fn is_empty_window(&self) -> bool {
        matches!((self.since, self.until), (Some(since), Some(until)) if since > until)
    }

    #[must_use]
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        if let Some(topic) = &self.topic {
            if !history_filter_matches(topic, &entry.topic) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// Fixed-capacity event log.
#[derive(Debug)]
pub struct EventHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl EventHistory {
    /// Create a history holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, evicting the oldest ones beyond capacity.
    pub fn record(&self, topic: &str, data: Value, timestamp: SystemTime) {
        let mut entries = self.entries.lock();
        entries.push_back(HistoryEntry {
            topic: topic.to_string(),
            data,
            timestamp,
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of the log, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Up to `limit` entries, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Entries selected by `filter`, in recorded order.
    #[must_use]
    pub fn select(&self, filter: &ReplayFilter) -> Vec<HistoryEntry> {
        if filter.is_empty_window() {
            return Vec::new();
        }
        self.entries
            .lock()
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
