//! Rendering of job listings as table, JSON or CSV.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::{Result, VidpipeError};
use crate::worker::Job;

/// Output format of [`super::VideoQueue::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl fmt::Display for ListFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListFormat::Table => "table",
            ListFormat::Json => "json",
            ListFormat::Csv => "csv",
        })
    }
}

impl FromStr for ListFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(ListFormat::Table),
            "json" => Ok(ListFormat::Json),
            "csv" => Ok(ListFormat::Csv),
            other => Err(format!("unknown list format '{}'", other)),
        }
    }
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct VideoListing {
    #[serde(rename = "ID")]
    #[tabled(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Title")]
    #[tabled(rename = "Title")]
    pub title: String,
    #[serde(rename = "Source")]
    #[tabled(rename = "Source")]
    pub source: String,
    #[serde(rename = "Views")]
    #[tabled(rename = "Views")]
    pub views: u64,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
}

const TITLE_WIDTH: usize = 60;

impl From<&Job> for VideoListing {
    fn from(job: &Job) -> Self {
        let title = match job.title() {
            "" => job.video_id.clone(),
            title => title.to_string(),
        };
        let date = job.processed_at.unwrap_or(job.created_at);
        Self {
            id: job.id.0,
            title,
            source: job.source_kind.to_string(),
            views: job.metadata.video.as_ref().map_or(0, |v| v.view_count),
            status: job.status.to_string(),
            date: date.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub fn render(rows: &[VideoListing], format: ListFormat) -> Result<String> {
    match format {
        ListFormat::Table => {
            if rows.is_empty() {
                return Ok("No videos found.".to_string());
            }
            let shortened: Vec<VideoListing> = rows
                .iter()
                .cloned()
                .map(|mut row| {
                    row.title = shorten(&row.title, TITLE_WIDTH);
                    row
                })
                .collect();
            let mut table = Table::new(shortened);
            table.with(Style::psql());
            Ok(table.to_string())
        }
        ListFormat::Json => serde_json::to_string_pretty(rows)
            .map_err(|e| VidpipeError::Output(e.to_string())),
        ListFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in rows {
                writer
                    .serialize(row)
                    .map_err(|e| VidpipeError::Output(e.to_string()))?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| VidpipeError::Output(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| VidpipeError::Output(e.to_string()))
        }
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
