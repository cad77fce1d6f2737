//! Bus configuration.
//!
//! Configuration is an explicit struct with built-in defaults. A host may
//! override it from environment variables or from a persisted JSON document
//! kept in a key-value store.
//!
//! # Example
//!
//! ```
//! use relay_bus::config::{BusConfig, ConfigStore, InMemoryConfigStore};
//!
//! let store = InMemoryConfigStore::new();
//! store.set(BusConfig::STORE_KEY, r#"{"debug": true, "maxListeners": 10}"#);
//!
//! let config = BusConfig::load(&store);
//! assert!(config.debug);
//! assert_eq!(config.max_listeners, 10);
//! assert_eq!(config.history_capacity, 500);
//! ```

use crate::error::BusError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use tracing::warn;

/// Default soft cap on subscribers per topic.
pub const DEFAULT_MAX_LISTENERS: usize = 100;

/// Default number of events kept in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Runtime configuration for an [`crate::EventBus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusConfig {
    /// Log subscribe/unsubscribe activity.
    pub debug: bool,
    /// Log every publish.
    pub log_events: bool,
    /// Subscriber count per topic at which a capacity warning is logged.
    pub max_listeners: usize,
    /// Whether subscriptions are async-flagged when the caller does not say.
    pub async_default: bool,
    /// Maximum number of history entries retained.
    pub history_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_events: false,
            max_listeners: DEFAULT_MAX_LISTENERS,
            async_default: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Partial document merged over defaults. Absent fields keep their default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BusConfigOverrides {
    debug: Option<bool>,
    log_events: Option<bool>,
    max_listeners: Option<usize>,
    async_default: Option<bool>,
    history_capacity: Option<usize>,
}

impl BusConfig {
    /// Key under which the configuration document is persisted.
    pub const STORE_KEY: &'static str = "relay_bus_config";

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_BUS_DEBUG`: Log subscription activity (default: false)
    /// - `RELAY_BUS_LOG_EVENTS`: Log every publish (default: false)
    /// - `RELAY_BUS_MAX_LISTENERS`: Soft per-topic subscriber cap (default: 100)
    /// - `RELAY_BUS_ASYNC_DEFAULT`: Async flag for new subscriptions (default: false)
    /// - `RELAY_BUS_HISTORY_CAPACITY`: History ring size (default: 500)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            debug: env_flag("RELAY_BUS_DEBUG").unwrap_or(defaults.debug),
            log_events: env_flag("RELAY_BUS_LOG_EVENTS").unwrap_or(defaults.log_events),
            max_listeners: env::var("RELAY_BUS_MAX_LISTENERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_listeners),
            async_default: env_flag("RELAY_BUS_ASYNC_DEFAULT").unwrap_or(defaults.async_default),
            history_capacity: env::var("RELAY_BUS_HISTORY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.history_capacity),
        }
    }

    /// Load the persisted document from `store` and merge it over defaults.
    ///
    /// A missing document yields defaults. A malformed one is logged and
    /// ignored.
    pub fn load(store: &dyn ConfigStore) -> Self {
        let Some(saved) = store.get(Self::STORE_KEY) else {
            return Self::default();
        };
        match serde_json::from_str::<BusConfigOverrides>(&saved) {
            Ok(overrides) => Self::default().merge(overrides),
            Err(e) => {
                warn!(error = %e, "Failed to load event bus config, using defaults");
                Self::default()
            }
        }
    }

    /// Persist the full configuration into `store`.
    pub fn save(&self, store: &dyn ConfigStore) -> Result<(), BusError> {
        let doc = serde_json::to_string(self).map_err(|e| BusError::Serialization(e.to_string()))?;
        store.set(Self::STORE_KEY, &doc);
        Ok(())
    }

    fn merge(mut self, overrides: BusConfigOverrides) -> Self {
        if let Some(v) = overrides.debug {
            self.debug = v;
        }
        if let Some(v) = overrides.log_events {
            self.log_events = v;
        }
        if let Some(v) = overrides.max_listeners {
            self.max_listeners = v;
        }
        if let Some(v) = overrides.async_default {
            self.async_default = v;
        }
        if let Some(v) = overrides.history_capacity {
            self.history_capacity = v;
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.history_capacity == 0 {
            return Err(BusError::InvalidConfig(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_listeners == 0 {
            return Err(BusError::InvalidConfig(
                "max_listeners must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder-style method to enable debug logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Builder-style method to enable per-publish logging
    pub fn with_log_events(mut self, log_events: bool) -> Self {
        self.log_events = log_events;
        self
    }

    /// Builder-style method to set the soft listener cap
    pub fn with_max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// Builder-style method to set the default async flag
    pub fn with_async_default(mut self, async_default: bool) -> Self {
        self.async_default = async_default;
        self
    }

    /// Builder-style method to set the history capacity
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

/// Key-value store the configuration can be persisted in.
pub trait ConfigStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);
}

/// Process-local [`ConfigStore`].
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }
}
