use serde::{Deserialize, Serialize};

use crate::extract::ExtractionToggles;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file; defaults to `~/.vidpipe/data/vidpipe.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Where the file sink writes published records; defaults to
    /// `~/.vidpipe/published`.
    #[serde(default)]
    pub output_directory: Option<String>,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub extraction: ExtractionToggles,
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            output_directory: None,
            queue: QueueConfig::default(),
            pipeline: PipelineConfig::default(),
            extraction: ExtractionToggles::default(),
            vendor: VendorConfig::default(),
            channel: ChannelConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Jobs claimed per scheduler tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Claims allowed before a transient failure becomes terminal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// A `processing` job untouched for this long is considered abandoned.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_batch_size() -> u32 {
    3
}

fn default_interval_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    60
}

fn default_backoff_max_secs() -> u64 {
    3600
}

fn default_stale_after_secs() -> u64 {
    1800
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_secs: default_interval_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl QueueConfig {
    /// Delay before the next claim after the given (1-based) failed attempt:
    /// `base * 2^(attempt-1)`, capped at `backoff_max_secs`.
    pub fn backoff_delay(&self, attempt: u32) -> std::time::Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let secs = self
            .backoff_base_secs
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_max_secs);
        std::time::Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptMode {
    Auto,
    Manual,
    Whisper,
}

impl TranscriptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptMode::Auto => "auto",
            TranscriptMode::Manual => "manual",
            TranscriptMode::Whisper => "whisper",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Videos shorter than this are skipped. `None` disables the gate.
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: Option<u64>,
    /// Skip videos reporting a zero duration (scheduled premieres).
    #[serde(default = "default_true")]
    pub skip_premieres: bool,
    #[serde(default = "default_transcript_mode")]
    pub transcript_mode: TranscriptMode,
    #[serde(default = "default_transcript_language")]
    pub transcript_language: String,
    /// Prompt used when no remote prompt is available.
    #[serde(default)]
    pub local_prompt: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_min_duration_secs() -> Option<u64> {
    Some(300)
}

fn default_transcript_mode() -> TranscriptMode {
    TranscriptMode::Auto
}

fn default_transcript_language() -> String {
    "it".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_duration_secs(),
            skip_premieres: true,
            transcript_mode: default_transcript_mode(),
            transcript_language: default_transcript_language(),
            local_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Inline license key. Prefer `license_key_file` or `license_key_env`.
    #[serde(default)]
    pub license_key: Option<String>,
    #[serde(default)]
    pub license_key_file: Option<String>,
    #[serde(default = "default_license_key_env")]
    pub license_key_env: Option<String>,
    /// License that unlocks the personalized golden prompt.
    #[serde(default = "default_prompt_license_key_env")]
    pub prompt_license_key_env: Option<String>,
    /// Site URL reported to the vendor in `X-Site-URL`.
    #[serde(default)]
    pub site_url: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_transcript_cache_ttl_secs")]
    pub transcript_cache_ttl_secs: u64,
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default = "default_circuit_breaker_cooldown_secs")]
    pub circuit_breaker_cooldown_secs: u64,
}

fn default_server_url() -> String {
    "https://aiedintorni.it".to_string()
}

fn default_license_key_env() -> Option<String> {
    Some("VIDPIPE_LICENSE_KEY".to_string())
}

fn default_prompt_license_key_env() -> Option<String> {
    Some("VIDPIPE_PROMPT_LICENSE_KEY".to_string())
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_transcript_cache_ttl_secs() -> u64 {
    7 * 24 * 3600
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_cooldown_secs() -> u64 {
    300
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            license_key: None,
            license_key_file: None,
            license_key_env: default_license_key_env(),
            prompt_license_key_env: default_prompt_license_key_env(),
            site_url: String::new(),
            cache_ttl_secs: default_cache_ttl_secs(),
            transcript_cache_ttl_secs: default_transcript_cache_ttl_secs(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_cooldown_secs: default_circuit_breaker_cooldown_secs(),
        }
    }
}

/// Channel identity substituted into prompt placeholders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub niche: String,
    #[serde(default)]
    pub link_youtube: String,
    #[serde(default)]
    pub link_telegram: String,
    #[serde(default)]
    pub link_facebook: String,
    #[serde(default)]
    pub link_instagram: String,
    #[serde(default)]
    pub link_website: String,
    #[serde(default)]
    pub link_donations: String,
    #[serde(default)]
    pub sponsor_name: String,
    #[serde(default)]
    pub sponsor_description: String,
    #[serde(default)]
    pub sponsor_link: String,
    #[serde(default)]
    pub business_email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub hashtag: String,
}

impl ChannelConfig {
    /// Placeholder names paired with their values.
    pub fn placeholders(&self) -> [(&'static str, &str); 15] {
        [
            ("CHANNEL_NAME", self.name.as_str()),
            ("HANDLE", self.handle.as_str()),
            ("NICHE", self.niche.as_str()),
            ("LINK_YOUTUBE", self.link_youtube.as_str()),
            ("LINK_TELEGRAM", self.link_telegram.as_str()),
            ("LINK_FACEBOOK", self.link_facebook.as_str()),
            ("LINK_INSTAGRAM", self.link_instagram.as_str()),
            ("LINK_WEBSITE", self.link_website.as_str()),
            ("LINK_DONATIONS", self.link_donations.as_str()),
            ("SPONSOR_NAME", self.sponsor_name.as_str()),
            ("SPONSOR_DESCRIPTION", self.sponsor_description.as_str()),
            ("SPONSOR_LINK", self.sponsor_link.as_str()),
            ("BUSINESS_EMAIL", self.business_email.as_str()),
            ("CHANNEL_BIO", self.bio.as_str()),
            ("CHANNEL_HASHTAG", self.hashtag.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
