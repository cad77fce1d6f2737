//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber with:
//! - an `EnvFilter` built from [`LoggingConfig::log_level`]
//! - human-readable output for development, or JSON lines when
//!   `json_logs` is set

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{LoggingConfig, TelemetryError};

/// Keeps logging active. Dropping it only logs; the global subscriber stays.
#[derive(Debug)]
pub struct LoggingGuard {
    service_name: String,
}

impl LoggingGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down logging...");
    }
}

/// Install the global subscriber.
///
/// Returns [`TelemetryError::AlreadyInitialized`] when a global subscriber
/// is already set, so calling it twice is harmless.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, TelemetryError> {
    let env_filter = config.filter()?;

    let json_layer = (config.console_output && config.json_logs).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let pretty_layer = (config.console_output && !config.json_logs).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        service_name: config.service_name.clone(),
    })
}

/// Log a bus event with the topic as a structured field.
///
/// ```rust,ignore
/// log_bus_event!(info, "user:login", "Forwarded from bridge", listeners = 3);
/// ```
#[macro_export]
macro_rules! log_bus_event {
    ($level:ident, $topic:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::__tracing::$level!(
            topic = %$topic,
            $($($field)*,)?
            $msg
        )
    };
}
