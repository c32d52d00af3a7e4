pub mod loader;
pub mod schema;

use std::path::PathBuf;

use secrecy::SecretString;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ChannelConfig, Config, LogFormat, LoggingConfig, PipelineConfig, QueueConfig, TranscriptMode,
    VendorConfig,
};

use crate::secrets::{resolve_secret_optional, SecretError};

impl Config {
    /// Resolved SQLite path.
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => PathBuf::from(expand_home(path)),
            None => crate::db::default_database_path()
                .unwrap_or_else(|| PathBuf::from("vidpipe.db")),
        }
    }

    /// Resolved output directory for the file sink.
    pub fn output_directory(&self) -> PathBuf {
        match &self.output_directory {
            Some(path) => PathBuf::from(expand_home(path)),
            None => dirs::home_dir()
                .map(|h| h.join(".vidpipe").join("published"))
                .unwrap_or_else(|| PathBuf::from("published")),
        }
    }
}

impl VendorConfig {
    /// Base license key, if one is configured.
    pub fn license_key(&self) -> Result<Option<SecretString>, SecretError> {
        resolve_secret_optional(
            self.license_key.as_deref(),
            self.license_key_file.as_deref(),
            self.license_key_env.as_deref(),
        )
    }

    /// License key that unlocks the personalized prompt, if configured.
    pub fn prompt_license_key(&self) -> Result<Option<SecretString>, SecretError> {
        resolve_secret_optional(None, None, self.prompt_license_key_env.as_deref())
    }

    /// Base URL of the vendor REST API, with a trailing slash.
    pub fn api_base(&self) -> String {
        format!(
            "{}/wp-json/ipv-vendor/v1/",
            self.server_url.trim_end_matches('/')
        )
    }
}

/// `~/.vidpipe/config.json`, used when no config path is given.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".vidpipe").join("config.json"))
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), "/abs/path");
        assert_eq!(expand_home("rel/~path"), "rel/~path");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/x"),
                format!("{}/x", home.to_string_lossy())
            );
        }
    }

    #[test]
    fn test_api_base() {
        let mut vendor = VendorConfig::default();
        assert_eq!(
            vendor.api_base(),
            "https://aiedintorni.it/wp-json/ipv-vendor/v1/"
        );
        vendor.server_url = "http://localhost:8080/".to_string();
        assert_eq!(
            vendor.api_base(),
            "http://localhost:8080/wp-json/ipv-vendor/v1/"
        );
    }

    #[test]
    fn test_inline_license_key() {
        let vendor = VendorConfig {
            license_key: Some("ABC-123".to_string()),
            license_key_env: None,
            ..Default::default()
        };
        let key = vendor.license_key().unwrap().unwrap();
        assert_eq!(key.expose_secret(), "ABC-123");
    }

    #[test]
    fn test_paths_resolve() {
        let config = Config {
            database_path: Some("/tmp/q.db".to_string()),
            ..Default::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/q.db"));
        assert!(Config::default().output_directory().ends_with("published"));
    }
}
