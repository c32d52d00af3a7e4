use crate::config::{ChannelConfig, Config, TranscriptMode};
use crate::extract::ExtractionToggles;

/// The slice of [`Config`] the pipeline needs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub min_duration_secs: Option<u64>,
    pub skip_premieres: bool,
    pub transcript_mode: TranscriptMode,
    pub transcript_language: String,
    pub local_prompt: Option<String>,
    pub extraction: ExtractionToggles,
    pub channel: ChannelConfig,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_duration_secs: config.pipeline.min_duration_secs,
            skip_premieres: config.pipeline.skip_premieres,
            transcript_mode: config.pipeline.transcript_mode,
            transcript_language: config.pipeline.transcript_language.clone(),
            local_prompt: config.pipeline.local_prompt.clone(),
            extraction: config.extraction,
            channel: config.channel.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
