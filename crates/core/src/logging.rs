//! Structured logging infrastructure for Custodia.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use custodia_core::logging;
///
/// logging::init();
/// tracing::info!("Document service started");
/// ```
pub fn init() {
    init_with(&LoggingConfig::default());
}

/// Initialize the logging system with JSON output for production environments.
///
/// This format is suitable for log aggregation systems and audit pipelines.
///
/// # Example
/// ```no_run
/// use custodia_core::logging;
///
/// logging::init_json();
/// tracing::info!(service = "verifier", "Service started");
/// ```
pub fn init_json() {
    init_with(&LoggingConfig {
        json: true,
        ..LoggingConfig::default()
    });
}

/// Initialize logging from a [`LoggingConfig`].
///
/// `RUST_LOG` still takes precedence over the configured level. Calling this
/// more than once is harmless; later calls are ignored.
pub fn init_with(config: &LoggingConfig) {
    let filter = build_filter(&config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_on_garbage_level() {
        // An unparsable directive must not panic
        let _ = build_filter("not a [valid directive");
    }

    #[test]
    fn test_init_twice_doesnt_panic() {
        init();
        init_json();
    }
}
