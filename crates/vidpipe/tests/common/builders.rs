//! Builders for test data.

#![allow(dead_code)]

use vidpipe::config::QueueConfig;
use vidpipe::pipeline::PipelineSettings;
use vidpipe::worker::job::VideoDetails;

/// Description in the shape the fallback prompt asks for.
pub const DESCRIPTION: &str = "\
### Descrizione
Una lunga chiacchierata su reti neurali e robotica.

### 🗂️ ARGOMENTI TRATTATI
• Reti Neurali: come funzionano
• Robotica: stato dell'arte

### 👤 OSPITI
• Mario Rossi — ricercatore

### Hashtag
#AI #Robotica #Podcast";

/// Builder for `VideoDetails`.
pub struct VideoBuilder {
    video: VideoDetails,
}

impl VideoBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            video: VideoDetails {
                title: title.to_string(),
                duration_raw: "PT20M".to_string(),
                duration_seconds: 1200,
                duration_formatted: "20:00".to_string(),
                view_count: 100,
                ..Default::default()
            },
        }
    }

    pub fn duration_secs(mut self, seconds: u64) -> Self {
        self.video.duration_seconds = seconds;
        self.video.duration_raw = format!("PT{}S", seconds);
        self.video.duration_formatted = format!("{}:{:02}", seconds / 60, seconds % 60);
        self
    }

    pub fn views(mut self, views: u64) -> Self {
        self.video.view_count = views;
        self
    }

    pub fn thumbnail(mut self, url: &str) -> Self {
        self.video.thumbnail_url = Some(url.to_string());
        self
    }

    pub fn chapters(mut self, chapters: &str) -> Self {
        self.video.native_chapters = Some(chapters.to_string());
        self
    }

    pub fn build(self) -> VideoDetails {
        self.video
    }
}

/// Builder for `PipelineSettings`.
pub struct SettingsBuilder {
    settings: PipelineSettings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: PipelineSettings::default(),
        }
    }

    pub fn min_duration_secs(mut self, seconds: u64) -> Self {
        self.settings.min_duration_secs = Some(seconds);
        self
    }

    pub fn skip_premieres(mut self, skip: bool) -> Self {
        self.settings.skip_premieres = skip;
        self
    }

    pub fn local_prompt(mut self, prompt: &str) -> Self {
        self.settings.local_prompt = Some(prompt.to_string());
        self
    }

    pub fn channel_name(mut self, name: &str) -> Self {
        self.settings.channel.name = name.to_string();
        self
    }

    pub fn build(self) -> PipelineSettings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue configuration with no backoff, so released jobs are claimable
/// again straight away.
pub fn queue_config(batch_size: u32, max_attempts: u32) -> QueueConfig {
    QueueConfig {
        batch_size,
        max_attempts,
        backoff_base_secs: 0,
        backoff_max_secs: 0,
        ..Default::default()
    }
}

pub fn youtube_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
