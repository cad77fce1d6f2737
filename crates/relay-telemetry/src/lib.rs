//! # Relay Telemetry
//!
//! Logging setup for processes hosting a Relay-Bus.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_logging, LoggingConfig};
//!
//! fn main() {
//!     let config = LoggingConfig::from_env();
//!     let _guard = init_logging(&config).expect("Failed to init logging");
//!
//!     // Bus dispatch, handler failures and capacity warnings are now logged
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `relay-bus` | Service name in the startup line |
//! | `RELAY_LOG_LEVEL` / `RUST_LOG` | `info` | Filter directives |
//! | `RELAY_JSON_LOGS` | `false` | JSON lines instead of pretty output |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;

pub use config::LoggingConfig;
pub use logging::{init_logging, LoggingGuard};

#[doc(hidden)]
pub use tracing as __tracing;

use thiserror::Error;

/// Logging initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
