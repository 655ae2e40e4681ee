//! Logging initialization
//!
//! Installs a `tracing` subscriber with an env filter and a console layer.
//! Library code only emits events; binaries call [`init_telemetry`] once.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name reported in the startup record
    pub service_name: String,
    /// Whether to enable console logging
    pub enable_console: bool,
    /// Whether to print event targets
    pub with_target: bool,
    /// Log filter (e.g., "info", "workpool=debug")
    pub log_filter: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "workpool".to_string(),
            enable_console: true,
            with_target: true,
            log_filter: None,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SERVICE_NAME`: Service name (default: "workpool")
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `WORKPOOL_LOG_TARGETS`: "false" hides event targets
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("SERVICE_NAME").unwrap_or_else(|_| "workpool".to_string()),
            enable_console: true,
            with_target: std::env::var("WORKPOOL_LOG_TARGETS")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
        }
    }

    /// The filter to install; falls back to "info" when unset or invalid
    pub fn env_filter(&self) -> EnvFilter {
        self.log_filter
            .as_ref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

/// Install the global subscriber
///
/// Returns false if a subscriber was already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> bool {
    let console_layer = if config.enable_console {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(config.with_target)
                .with_filter(config.env_filter()),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %config.service_name, "Telemetry initialized");
    }
    installed
}
