//! Error types for the event bus.

use thiserror::Error;

/// Errors returned synchronously to callers of the bus API.
///
/// These are argument and configuration problems only. Handler failures and
/// capacity warnings never surface here; they are contained by the dispatcher
/// and reported through logging and [`crate::metrics::BusMetrics`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A subscription was rejected before any state was touched.
    #[error("Invalid subscription: {reason}")]
    InvalidSubscription { reason: String },

    /// Publish was called with an empty topic.
    #[error("Cannot publish to an empty topic")]
    InvalidTopic,

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failure of a single handler invocation.
///
/// Produced at the dispatcher boundary and isolated to the offending
/// subscription.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("Handler failed: {0}")]
    Failed(String),

    /// The handler panicked while running.
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// An async handler was reached from the synchronous path with no runtime to run it on.
    #[error("No async runtime available to run handler")]
    NoRuntime,
}

impl HandlerError {
    /// Convenience constructor for handler implementations.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

/// Outcome of a single handler.
pub type HandlerResult = Result<serde_json::Value, HandlerError>;
