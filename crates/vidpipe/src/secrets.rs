//! License key resolution.
//!
//! A key can be configured in three ways, tried in this order:
//!
//! 1. **Direct value** in the config file (local testing only)
//! 2. **File reference** (Docker secrets, `/run/secrets/...`)
//! 3. **Environment variable**
//!
//! Resolved keys are wrapped in [`SecretString`] so they never end up in
//! `Debug` output or logs.

use secrecy::SecretString;
use std::fs;

use crate::config::expand_home;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("no license key configured (set a value, a key file or an environment variable)")]
    NoSourceProvided,

    #[error("cannot read key file {path}: {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("${name} is not set")]
    EnvVarNotSet { name: String },

    #[error("${name} is not valid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("key from {origin} is empty")]
    Empty { origin: String },
}

type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first source that is configured.
///
/// A configured source that cannot be read is an error; it does not fall
/// through to the next source.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return match fs::read_to_string(&expanded) {
            Ok(content) => non_empty(content.trim(), &expanded),
            Err(source) => Err(SecretError::FileReadError {
                path: expanded,
                source,
            }),
        };
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) => non_empty(value.trim(), name),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

fn non_empty(value: &str, origin: &str) -> Result<SecretString> {
    if value.is_empty() {
        return Err(SecretError::Empty {
            origin: origin.to_string(),
        });
    }
    Ok(SecretString::from(value.to_string()))
}

/// Like [`resolve_secret`], but an absent or unset source yields `None`.
///
/// Unreadable files are still reported as errors.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided)
        | Err(SecretError::EnvVarNotSet { .. })
        | Err(SecretError::Empty { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
