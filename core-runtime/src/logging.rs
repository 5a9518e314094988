//! Logging bootstrap for hosts embedding the core.
//!
//! Installs a global `tracing` subscriber with an `EnvFilter`. Hosts that
//! already manage their own subscriber simply never call [`init_logging`].

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Output format for the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-oriented multi-line output for development.
    Pretty,
    /// Single-line output for terminals and log files.
    #[default]
    Compact,
    /// Newline-delimited JSON for log collectors.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Include target (module path) in each line.
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Compact,
            with_target: true,
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns `Error::Logging` if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| Error::Logging(e.to_string()))
}
