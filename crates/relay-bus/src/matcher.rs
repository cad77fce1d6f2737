//! # Topic Matching
//!
//! Two kinds of registered topic exist:
//!
//! - **Exact**: `"chat:message"` fires only for `"chat:message"`.
//! - **Namespace**: `"chat:*"` fires for any `"chat:<suffix>"`, never for the
//!   bare root `"chat"`.
//!
//! There is no other pattern syntax. Wildcard (match-everything) subscriptions
//! are registered through `subscribe_any` and never go through this parser.

/// Suffix that turns a topic into a namespace pattern.
pub const NAMESPACE_SUFFIX: &str = ":*";

/// Classified form of a topic given to `subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicPattern {
    /// Fires for this exact topic.
    Exact(String),
    /// Fires for `"<prefix>:<anything>"`.
    Namespace(String),
}

impl TopicPattern {
    /// Classify a registered topic.
    #[must_use]
    pub fn parse(topic: &str) -> Self {
        match topic.strip_suffix(NAMESPACE_SUFFIX) {
            Some(prefix) => Self::Namespace(prefix.to_string()),
            None => Self::Exact(topic.to_string()),
        }
    }
}

/// `true` when `topic` is `"<prefix>:<suffix>"` and not the root itself.
#[must_use]
pub fn namespace_matches(prefix: &str, topic: &str) -> bool {
    topic != prefix
        && topic
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(':'))
}

/// Topic filter used by replay: the topic itself or anything beneath it.
#[must_use]
pub fn history_filter_matches(filter_topic: &str, topic: &str) -> bool {
    topic == filter_topic || namespace_matches(filter_topic, topic)
}
