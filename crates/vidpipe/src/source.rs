//! Video source detection.
//!
//! Maps a user-supplied URL (or bare id) to a [`SourceKind`] and the
//! provider's video id.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static RE_YOUTUBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?|shorts|live)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#)
        .unwrap()
});
static RE_VIMEO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"vimeo\.com/(?:video/)?(\d+)").unwrap());
static RE_DAILYMOTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:dailymotion\.com/video/|dai\.ly/)([a-zA-Z0-9]+)").unwrap()
});
static RE_DAILYMOTION_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^x[a-zA-Z0-9]+$").unwrap());
static RE_YOUTUBE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

/// Video hosting provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Youtube,
    Vimeo,
    Dailymotion,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Youtube, SourceKind::Vimeo, SourceKind::Dailymotion];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Youtube => "youtube",
            SourceKind::Vimeo => "vimeo",
            SourceKind::Dailymotion => "dailymotion",
        }
    }

    /// Canonical watch URL for a video id.
    pub fn watch_url(&self, video_id: &str) -> String {
        match self {
            SourceKind::Youtube => format!("https://www.youtube.com/watch?v={}", video_id),
            SourceKind::Vimeo => format!("https://vimeo.com/{}", video_id),
            SourceKind::Dailymotion => format!("https://www.dailymotion.com/video/{}", video_id),
        }
    }

    /// Thumbnail URL that can be derived from the id alone, when the
    /// provider publishes one at a stable location.
    pub fn derived_thumbnail_url(&self, video_id: &str) -> Option<String> {
        match self {
            SourceKind::Youtube => Some(format!(
                "https://i.ytimg.com/vi/{}/maxresdefault.jpg",
                video_id
            )),
            SourceKind::Dailymotion => Some(format!(
                "https://www.dailymotion.com/thumbnail/video/{}",
                video_id
            )),
            SourceKind::Vimeo => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(SourceKind::Youtube),
            "vimeo" => Ok(SourceKind::Vimeo),
            "dailymotion" => Ok(SourceKind::Dailymotion),
            other => Err(SourceError::UnknownKind(other.to_string())),
        }
    }
}

/// Errors from source detection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Unrecognized video URL: {0}")]
    Unrecognized(String),

    #[error("Unknown source kind: {0}")]
    UnknownKind(String),
}

/// A URL resolved to its provider and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedVideo {
    pub kind: SourceKind,
    pub video_id: String,
    pub url: String,
}

/// Resolves a URL or bare video id.
///
/// Bare 11-character ids are treated as YouTube ids; bare ids starting with
/// `x` that are not 11 characters long are treated as Dailymotion ids.
pub fn detect(input: &str) -> Result<DetectedVideo, SourceError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SourceError::Unrecognized(input.to_string()));
    }

    let found = if let Some(c) = RE_YOUTUBE.captures(input) {
        Some((SourceKind::Youtube, c[1].to_string()))
    } else if let Some(c) = RE_VIMEO.captures(input) {
        Some((SourceKind::Vimeo, c[1].to_string()))
    } else if let Some(c) = RE_DAILYMOTION.captures(input) {
        Some((SourceKind::Dailymotion, c[1].to_string()))
    } else if RE_YOUTUBE_BARE.is_match(input) {
        Some((SourceKind::Youtube, input.to_string()))
    } else if RE_DAILYMOTION_BARE.is_match(input) {
        Some((SourceKind::Dailymotion, input.to_string()))
    } else {
        None
    };

    match found {
        Some((kind, video_id)) => {
            let url = if input.contains("://") {
                input.to_string()
            } else {
                kind.watch_url(&video_id)
            };
            Ok(DetectedVideo {
                kind,
                video_id,
                url,
            })
        }
        None => Err(SourceError::Unrecognized(input.to_string())),
    }
}
