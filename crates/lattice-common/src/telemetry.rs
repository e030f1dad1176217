//! Telemetry initialization for structured logging
//!
//! Provides unified logging setup with:
//! - `RUST_LOG`-style filtering via `EnvFilter`, falling back to a default directive
//! - JSON structured logs for in-cluster runs, compact logs for terminals
//! - Service name and version recorded once at startup

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default filter directive when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,lattice=debug,kube=info,tower=warn,hyper=warn";

/// Errors that can occur during telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed
    #[error("invalid log filter {directive:?}: {message}")]
    InvalidFilter {
        /// The directive that failed to parse
        directive: String,
        /// Parser message
        message: String,
    },

    /// Failed to initialize tracing subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable single-line output
    Compact,
}

/// Configuration for telemetry initialization
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name recorded at startup (e.g., "lattice-collect")
    pub service_name: String,

    /// Log line format
    pub format: LogFormat,

    /// Filter directive used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "lattice".to_string(),
            format: LogFormat::default(),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create a config for the named service with default format and filter
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log line format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Build the filter, preferring `RUST_LOG` over the configured default
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => {
                EnvFilter::try_new(&self.default_filter).map_err(|e| {
                    TelemetryError::InvalidFilter {
                        directive: self.default_filter.clone(),
                        message: e.to_string(),
                    }
                })
            }
        }
    }
}

/// Initialize the global tracing subscriber
///
/// Logs go to stderr so that command output on stdout stays machine-readable.
///
/// # Example
///
/// ```ignore
/// use lattice_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
///
/// init_telemetry(TelemetryConfig::new("lattice-collect").with_format(LogFormat::Compact))?;
/// ```
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = config.env_filter()?;

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::SubscriberInit(e.to_string())
        })?;

    tracing::info!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "lattice");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.default_filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_telemetry_config_builder() {
        let config = TelemetryConfig::new("lattice-collect").with_format(LogFormat::Compact);
        assert_eq!(config.service_name, "lattice-collect");
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_invalid_default_filter_is_reported() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = TelemetryConfig {
            default_filter: "lattice=notalevel".to_string(),
            ..Default::default()
        };
        let err = config.env_filter().unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }
}
