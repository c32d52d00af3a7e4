//! Aggregate queries over imported videos.

use serde::Serialize;

use super::{Database, DatabaseError};

/// Library-wide totals over successfully processed videos.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub total_videos: u64,
    pub total_views: u64,
    pub total_duration_secs: u64,
    pub avg_views: u64,
}

/// Computes totals from the `video` section of done-job metadata.
///
/// Videos without metadata count toward `total_videos` and contribute zero
/// views and duration.
pub fn video_summary(db: &Database) -> Result<VideoSummary, DatabaseError> {
    db.with_conn(|conn| {
        let (total_videos, total_views, total_duration_secs): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(COALESCE(json_extract(metadata, '$.video.view_count'), 0)), 0),
                    COALESCE(SUM(COALESCE(json_extract(metadata, '$.video.duration_seconds'), 0)), 0)
             FROM jobs WHERE status = 'done'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        let total_videos = total_videos.max(0) as u64;
        let total_views = total_views.max(0) as u64;
        let avg_views = if total_videos > 0 {
            total_views / total_videos
        } else {
            0
        };

        Ok(VideoSummary {
            total_videos,
            total_views,
            total_duration_secs: total_duration_secs.max(0) as u64,
            avg_views,
        })
    })
}
