//! JSON shapes of the vendor API and their conversion to domain types.
//!
//! The vendor proxies several providers and is loose with types: counts
//! arrive as numbers or numeric strings, durations as ISO 8601 strings,
//! clock strings or plain seconds.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::pipeline::duration::{format_duration, parse_duration};
use crate::worker::job::VideoDetails;

static RE_CHAPTER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?(\d{1,2}:)?\d{1,2}:\d{2}\)?\s+\S").unwrap());

#[derive(Debug, Deserialize)]
pub(crate) struct VideoDataResponse {
    #[serde(default)]
    pub video_data: Option<WireVideo>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireVideo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub duration: Value,
    #[serde(default)]
    pub view_count: Value,
    #[serde(default)]
    pub like_count: Value,
    #[serde(default)]
    pub comment_count: Value,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub thumbnail_maxres: Option<String>,
    #[serde(default)]
    pub thumbnail_standard: Option<String>,
    #[serde(default)]
    pub thumbnail_high: Option<String>,
    #[serde(default)]
    pub thumbnail_medium: Option<String>,
    #[serde(default)]
    pub thumbnail_default: Option<String>,
}

impl From<WireVideo> for VideoDetails {
    fn from(wire: WireVideo) -> Self {
        let (duration_raw, duration_seconds) = match &wire.duration {
            Value::String(s) => (s.clone(), parse_duration(s)),
            Value::Number(n) => (n.to_string(), n.as_u64().unwrap_or(0)),
            _ => (String::new(), 0),
        };

        let thumbnail_url = [
            wire.thumbnail_url,
            wire.thumbnail_maxres,
            wire.thumbnail_standard,
            wire.thumbnail_high,
            wire.thumbnail_medium,
            wire.thumbnail_default,
        ]
        .into_iter()
        .flatten()
        .find(|url| !url.is_empty());

        VideoDetails {
            native_chapters: native_chapters(&wire.description),
            title: wire.title,
            duration_raw,
            duration_seconds,
            duration_formatted: format_duration(duration_seconds),
            thumbnail_url,
            view_count: lenient_u64(&wire.view_count),
            like_count: lenient_u64(&wire.like_count),
            comment_count: lenient_u64(&wire.comment_count),
            published_at: wire.published_at.filter(|s| !s.is_empty()),
            channel_title: wire.channel_title.filter(|s| !s.is_empty()),
        }
    }
}

/// Reads a count sent as a number or a numeric string; anything else is 0.
fn lenient_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Chapter list embedded by the uploader in the video description.
///
/// Providers only render chapters when the first timestamp is `0:00` and
/// there are at least two of them; the same rule is applied here.
pub(crate) fn native_chapters(description: &str) -> Option<String> {
    let lines: Vec<&str> = description
        .lines()
        .map(str::trim)
        .filter(|line| RE_CHAPTER_LINE.is_match(line))
        .collect();

    let starts_at_zero = lines.first().is_some_and(|first| {
        let ts = first.trim_start_matches('(');
        ts.starts_with("0:00") || ts.starts_with("00:00") || ts.starts_with("0:00:00")
    });

    if lines.len() >= 2 && starts_at_zero {
        Some(lines.join("\n"))
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranscriptResponse {
    #[serde(default)]
    pub transcript: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DescriptionResponse {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoldenPromptResponse {
    #[serde(default)]
    pub has_golden_prompt: bool,
    #[serde(default)]
    pub golden_prompt: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoldenPromptCheckResponse {
    #[serde(default)]
    pub has_golden_prompt: bool,
}

/// Human-readable message from an error body (`message`, then `error`).
pub(crate) fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "unknown server error".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}
