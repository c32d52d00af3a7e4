//! Reading and validating `config.json`.
//!
//! Two passes: the embedded JSON Schema catches shape errors with precise
//! paths, then [`check`] enforces rules that span several fields.

use std::path::Path;
use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");
const SUPPORTED_VERSION: &str = "1.0";

static VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| format!("embedded schema is not JSON: {e}"))?;
    jsonschema::validator_for(&schema).map_err(|e| format!("embedded schema does not compile: {e}"))
});

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Loading configuration from {}", path.display());
    load_config_from_str(&raw)
}

pub fn load_config_from_str(raw: &str) -> Result<Config, ConfigError> {
    let document: Value = serde_json::from_str(raw)?;
    check_shape(&document)?;
    let config: Config = serde_json::from_value(document)?;
    check(&config)?;
    Ok(config)
}

fn check_shape(document: &Value) -> Result<(), ConfigError> {
    let validator = VALIDATOR.as_ref().map_err(|message| invalid(message.clone()))?;
    let problems: Vec<String> = validator
        .iter_errors(document)
        .map(|e| e.to_string())
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::SchemaValidation {
            errors: problems.join("; "),
        })
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

/// Cross-field rules the schema cannot express.
fn check(config: &Config) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(invalid(format!(
            "version {} is not supported (expected {})",
            config.version, SUPPORTED_VERSION
        )));
    }

    let queue = &config.queue;
    if queue.backoff_max_secs < queue.backoff_base_secs {
        return Err(invalid(format!(
            "queue.backoff_max_secs ({}) is smaller than queue.backoff_base_secs ({})",
            queue.backoff_max_secs, queue.backoff_base_secs
        )));
    }
    if queue.stale_after_secs <= queue.interval_secs {
        log::warn!(
            "queue.stale_after_secs ({}) does not exceed queue.interval_secs ({}); \
             jobs of a slow batch may be recovered while still running",
            queue.stale_after_secs,
            queue.interval_secs
        );
    }

    if config.vendor.server_url.trim_end_matches('/').is_empty() {
        return Err(invalid("vendor.server_url is empty"));
    }

    let blank_prompt = config
        .pipeline
        .local_prompt
        .as_deref()
        .is_some_and(|p| p.trim().is_empty());
    if blank_prompt {
        return Err(invalid("pipeline.local_prompt is blank; remove the key instead"));
    }

    if let Err(e) = config.logging.level.parse::<tracing_subscriber::EnvFilter>() {
        return Err(invalid(format!(
            "logging.level {:?} is not a valid filter: {}",
            config.logging.level, e
        )));
    }

    Ok(())
}
