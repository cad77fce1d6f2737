//! Recording handlers and logging setup shared by the integration flows.

use parking_lot::Mutex;
use relay_bus::{done, Handler, HandlerError};
use relay_telemetry::{init_logging, LoggingConfig, LoggingGuard};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

static LOGGING: OnceLock<Option<LoggingGuard>> = OnceLock::new();

/// Install logging once per test binary. Honours `RELAY_LOG_LEVEL`.
pub fn init_test_logging() {
    LOGGING.get_or_init(|| init_logging(&LoggingConfig::from_env()).ok());
}

/// Ordered log of `(label, payload)` handler invocations.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that records its label and payload.
    pub fn handler(&self, label: &str) -> Handler {
        let calls = self.calls.clone();
        let label = label.to_string();
        Handler::sync(move |data, _| {
            calls.lock().push((label.clone(), data.clone()));
            done()
        })
    }

    /// A handler that records, then reports failure.
    pub fn failing(&self, label: &str) -> Handler {
        let calls = self.calls.clone();
        let label = label.to_string();
        Handler::sync(move |data, _| {
            calls.lock().push((label.clone(), data.clone()));
            Err(HandlerError::failed(format!("{label} refused")))
        })
    }

    /// A handler that records, then panics.
    pub fn panicking(&self, label: &str) -> Handler {
        let calls = self.calls.clone();
        let label = label.to_string();
        Handler::sync(move |data, _| {
            calls.lock().push((label.clone(), data.clone()));
            panic!("{label} blew up");
        })
    }

    /// An async handler that yields once before recording.
    pub fn deferred(&self, label: &str) -> Handler {
        let calls = self.calls.clone();
        let label = label.to_string();
        Handler::from_async(move |data, _| {
            let calls = calls.clone();
            let label = label.clone();
            async move {
                tokio::task::yield_now().await;
                calls.lock().push((label, data));
                done()
            }
        })
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(label, _)| label.clone()).collect()
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}
