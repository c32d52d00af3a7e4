//! Tracing subscriber setup.
//!
//! Library code logs through both `log` and `tracing`; `LogTracer` forwards
//! `log` records into the tracing subscriber so both end up in one stream.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Result, VidpipeError};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "VIDPIPE_LOG";

/// Builds the filter: `VIDPIPE_LOG` when set, the configured level otherwise.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| VidpipeError::Telemetry(format!("invalid log filter '{}': {}", config.level, e)))
}

/// Installs the global subscriber. Call once, at startup.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_target(true).with_writer(std::io::stderr)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            ),
        ),
    };
    installed.map_err(|e| VidpipeError::Telemetry(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| VidpipeError::Telemetry(e.to_string()))?;

    tracing::debug!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_filter_from_config() {
        std::env::remove_var(LOG_ENV);
        let config = LoggingConfig {
            level: "vidpipe=debug,warn".to_string(),
            ..Default::default()
        };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    #[serial]
    fn test_invalid_filter() {
        std::env::remove_var(LOG_ENV);
        let config = LoggingConfig {
            level: "vidpipe=loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(env_filter(&config), Err(VidpipeError::Telemetry(_))));
    }

    #[test]
    #[serial]
    fn test_env_overrides_config() {
        std::env::set_var(LOG_ENV, "trace");
        let config = LoggingConfig {
            level: "vidpipe=loud".to_string(),
            ..Default::default()
        };
        let result = env_filter(&config);
        std::env::remove_var(LOG_ENV);
        assert!(result.is_ok());
    }
}
