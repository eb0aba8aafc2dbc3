//! # Core Interface Telemetry
//!
//! Structured logging for the Core Interface. Every RPC call runs inside an
//! `rpc_call` span carrying the request kind and correlation token, so a
//! single call can be followed from the HTTP handler to the reply listener.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ci_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CI_SERVICE_NAME` | `core-interface` | Service name stamped on startup logs |
//! | `CI_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `CI_CONSOLE_OUTPUT` | `true` | Emit logs to stdout |
//! | `CI_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

mod config;
mod subscriber;

pub use config::TelemetryConfig;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Install the global tracing subscriber.
///
/// Returns a guard that should be held for the lifetime of the process.
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    subscriber::init_subscriber(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        log_level = %config.log_level,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Span wrapping one broker RPC call.
///
/// ```rust,ignore
/// let span = ci_telemetry::rpc_span!("search", token);
/// ```
#[macro_export]
macro_rules! rpc_span {
    ($kind:expr, $correlation_id:expr) => {
        tracing::info_span!(
            "rpc_call",
            kind = %$kind,
            correlation_id = %$correlation_id
        )
    };
}
