//! Process-wide logging setup.
//!
//! Library code logs through the `log` macros and opens `tracing` spans;
//! the subscriber installed here receives both.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogFormat;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builds the filter: `RUST_LOG` when set, otherwise `level`.
pub fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        filter: level.to_string(),
        message: e.to_string(),
    })
}

/// Installs the global subscriber and routes `log` records into it.
/// Call once, from the binary.
pub fn init_logging(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    let filter = env_filter(level)?;

    tracing_log::LogTracer::init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_target(true).with_thread_names(true)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            ),
        ),
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_accepts_plain_level() {
        std::env::remove_var("RUST_LOG");
        assert!(env_filter("debug").is_ok());
    }

    #[test]
    #[serial]
    fn test_env_filter_accepts_directives() {
        std::env::remove_var("RUST_LOG");
        assert!(env_filter("catalog_orchestrator=debug,reqwest=warn").is_ok());
    }
}
