//! # Subscription Registry
//!
//! Owns every live subscription, split into three stores:
//!
//! - `wildcard`: fires for every publish
//! - `exact`: keyed by the exact topic
//! - `namespaces`: `"<prefix>:*"` registrations, kept in registration order so
//!   candidate collection is deterministic
//!
//! Every list is kept sorted by descending priority. The sort is stable, so
//! equal priorities keep insertion order.
//!
//! The registry itself is not synchronized; the bus wraps it in a single
//! read-write lock and never runs handlers while holding it.

use crate::matcher::{namespace_matches, TopicPattern};
use crate::subscription::{SubscriberRef, Subscription, SubscriptionOwner};
use std::collections::HashMap;
use std::sync::Arc;

type SubscriptionList = Vec<Arc<Subscription>>;

#[derive(Debug)]
struct NamespaceSlot {
    prefix: String,
    subscriptions: SubscriptionList,
}

/// Topic-to-subscription mapping plus the wildcard list.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    wildcard: SubscriptionList,
    exact: HashMap<String, SubscriptionList>,
    namespaces: Vec<NamespaceSlot>,
}

fn insert_sorted(list: &mut SubscriptionList, subscription: Arc<Subscription>) {
    list.push(subscription);
    // `sort_by` is stable: ties keep insertion order.
    list.sort_by(|a, b| b.priority.cmp(&a.priority));
}

fn remove_first(list: &mut SubscriptionList, target: &SubscriberRef) -> Option<Arc<Subscription>> {
    let idx = list.iter().position(|s| target.matches(s))?;
    Some(list.remove(idx))
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a subscription in the list named by its owner.
    ///
    /// Returns how many subscriptions that list held before the insert.
    pub fn insert(&mut self, subscription: Arc<Subscription>) -> usize {
        match subscription.owner.clone() {
            SubscriptionOwner::Wildcard => {
                let before = self.wildcard.len();
                insert_sorted(&mut self.wildcard, subscription);
                before
            }
            SubscriptionOwner::Exact(topic) => {
                let list = self.exact.entry(topic).or_default();
                let before = list.len();
                insert_sorted(list, subscription);
                before
            }
            SubscriptionOwner::Namespace(prefix) => {
                let idx = match self.namespaces.iter().position(|slot| slot.prefix == prefix) {
                    Some(idx) => idx,
                    None => {
                        self.namespaces.push(NamespaceSlot {
                            prefix,
                            subscriptions: Vec::new(),
                        });
                        self.namespaces.len() - 1
                    }
                };
                let list = &mut self.namespaces[idx].subscriptions;
                let before = list.len();
                insert_sorted(list, subscription);
                before
            }
        }
    }

    /// Remove the first subscription in `owner`'s list matching `target`.
    ///
    /// Lists left empty are dropped so [`Self::topics`] only reports live
    /// topics.
    pub fn remove(
        &mut self,
        owner: &SubscriptionOwner,
        target: &SubscriberRef,
    ) -> Option<Arc<Subscription>> {
        match owner {
            SubscriptionOwner::Wildcard => remove_first(&mut self.wildcard, target),
            SubscriptionOwner::Exact(topic) => {
                let list = self.exact.get_mut(topic)?;
                let removed = remove_first(list, target);
                if list.is_empty() {
                    self.exact.remove(topic);
                }
                removed
            }
            SubscriptionOwner::Namespace(prefix) => {
                let idx = self.namespaces.iter().position(|slot| &slot.prefix == prefix)?;
                let removed = remove_first(&mut self.namespaces[idx].subscriptions, target);
                if self.namespaces[idx].subscriptions.is_empty() {
                    self.namespaces.remove(idx);
                }
                removed
            }
        }
    }

    /// Drop every direct subscription registered under `topic`.
    ///
    /// Returns the number removed.
    pub fn remove_topic(&mut self, topic: &str) -> usize {
        match TopicPattern::parse(topic) {
            TopicPattern::Exact(t) => self.exact.remove(&t).map_or(0, |list| list.len()),
            TopicPattern::Namespace(prefix) => {
                match self.namespaces.iter().position(|slot| slot.prefix == prefix) {
                    Some(idx) => self.namespaces.remove(idx).subscriptions.len(),
                    None => 0,
                }
            }
        }
    }

    /// Drop everything, wildcard subscriptions included.
    pub fn clear(&mut self) -> usize {
        let total = self.total();
        self.wildcard.clear();
        self.exact.clear();
        self.namespaces.clear();
        total
    }

    /// Candidate subscriptions for a published topic, in source order:
    /// wildcard, exact, then each matching namespace in registration order.
    #[must_use]
    pub fn collect(&self, topic: &str) -> Vec<Arc<Subscription>> {
        let mut candidates = self.wildcard.clone();
        if let Some(list) = self.exact.get(topic) {
            candidates.extend(list.iter().cloned());
        }
        for slot in &self.namespaces {
            if namespace_matches(&slot.prefix, topic) {
                candidates.extend(slot.subscriptions.iter().cloned());
            }
        }
        candidates
    }

    /// Wildcard subscribers plus direct subscribers of `topic`, or the grand
    /// total when `topic` is `None`.
    #[must_use]
    pub fn listener_count(&self, topic: Option<&str>) -> usize {
        let Some(topic) = topic else {
            return self.total();
        };
        self.wildcard.len() + self.direct_count(topic)
    }

    /// Direct subscribers registered under exactly this topic string.
    #[must_use]
    pub fn direct_count(&self, topic: &str) -> usize {
        match TopicPattern::parse(topic) {
            TopicPattern::Exact(t) => self.exact.get(&t).map_or(0, Vec::len),
            TopicPattern::Namespace(prefix) => self
                .namespaces
                .iter()
                .find(|slot| slot.prefix == prefix)
                .map_or(0, |slot| slot.subscriptions.len()),
        }
    }

    #[must_use]
    pub fn wildcard_count(&self) -> usize {
        self.wildcard.len()
    }

    /// Topics with at least one direct subscription, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .exact
            .keys()
            .cloned()
            .chain(
                self.namespaces
                    .iter()
                    .map(|slot| format!("{}:*", slot.prefix)),
            )
            .collect();
        topics.sort();
        topics
    }

    fn total(&self) -> usize {
        self.wildcard.len()
            + self.exact.values().map(Vec::len).sum::<usize>()
            + self
                .namespaces
                .iter()
                .map(|slot| slot.subscriptions.len())
                .sum::<usize>()
    }
}
