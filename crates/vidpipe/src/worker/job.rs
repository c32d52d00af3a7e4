use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::{Entities, ExtractionOverrides};
use crate::source::SourceKind;

/// Priority given to jobs enqueued without an explicit one. Lower is more urgent.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Database identifier of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Error,
    Skipped,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Done,
        JobStatus::Error,
        JobStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Skipped => "skipped",
        }
    }

    /// Terminal states are left only through an operator retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Skipped)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status '{}'", s))
    }
}

/// Processing stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    DurationGate,
    Transcript,
    Description,
    Extraction,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Metadata,
        Stage::DurationGate,
        Stage::Transcript,
        Stage::Description,
        Stage::Extraction,
        Stage::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::DurationGate => "duration_gate",
            Stage::Transcript => "transcript",
            Stage::Description => "description",
            Stage::Extraction => "extraction",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video details returned by the metadata gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: String,
    /// Duration as reported by the provider (`PT1H2M3S`, `1:02:03`, ...).
    #[serde(default)]
    pub duration_raw: String,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub duration_formatted: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    /// Chapter list published by the uploader, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_chapters: Option<String>,
}

/// Whether a transcript could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TranscriptOutcome {
    Available { chars: usize },
    Unavailable { reason: String },
}

impl TranscriptOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, TranscriptOutcome::Available { .. })
    }
}

/// Where the prompt used for a generation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    Personalized,
    Legacy,
    Local,
    Fallback,
}

impl fmt::Display for PromptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PromptSource::Personalized => "personalized",
            PromptSource::Legacy => "legacy",
            PromptSource::Local => "local",
            PromptSource::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// AI-generated description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionOutput {
    pub text: String,
    pub prompt_source: PromptSource,
    pub generated_at: DateTime<Utc>,
}

/// Acknowledgement from the content sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Typed aggregate of stage outputs, persisted as JSON on the job row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<DescriptionOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishReceipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed_stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "ExtractionOverrides::is_empty")]
    pub extraction: ExtractionOverrides,
}

impl JobMetadata {
    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Records a stage checkpoint. Recording the same stage twice is a no-op.
    pub fn mark_completed(&mut self, stage: Stage) {
        if !self.is_completed(stage) {
            self.completed_stages.push(stage);
        }
    }
}

/// A queued unit of work: one video moving through the stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub video_id: String,
    pub source_url: String,
    pub source_kind: SourceKind,
    pub status: JobStatus,
    pub priority: i32,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub metadata: JobMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub available_at: DateTime<Utc>,
    pub claim_token: Option<String>,
}

impl Job {
    /// The claim this job was dequeued under. `None` unless the job is
    /// `processing`.
    pub fn claim(&self) -> Option<Claim> {
        match (&self.status, &self.claim_token) {
            (JobStatus::Processing, Some(token)) => Some(Claim {
                id: self.id,
                token: token.clone(),
            }),
            _ => None,
        }
    }

    pub fn title(&self) -> &str {
        self.metadata
            .video
            .as_ref()
            .map(|v| v.title.as_str())
            .unwrap_or("")
    }
}

/// Ownership of a dequeued job.
///
/// Every write a worker makes while processing a job goes through its
/// claim. Once stale recovery hands the job to another worker the old
/// claim stops matching and those writes are refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub id: JobId,
    pub token: String,
}

/// Parameters for enqueueing a video.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub video_id: String,
    pub source_url: String,
    pub source_kind: SourceKind,
    pub priority: i32,
    pub extraction: ExtractionOverrides,
}

impl EnqueueRequest {
    pub fn new(video_id: impl Into<String>, source_url: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            video_id: video_id.into(),
            source_url: source_url.into(),
            source_kind,
            priority: DEFAULT_PRIORITY,
            extraction: ExtractionOverrides::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionOverrides) -> Self {
        self.extraction = extraction;
        self
    }
}

/// Result of an enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    pub id: JobId,
    /// False when an active job for the same video already existed.
    pub created: bool,
}

/// Job counts per status. Every status is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub done: u64,
    pub error: u64,
    pub skipped: u64,
}

impl QueueStats {
    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Processing => self.processing,
            JobStatus::Done => self.done,
            JobStatus::Error => self.error,
            JobStatus::Skipped => self.skipped,
        }
    }

    pub(crate) fn set(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Pending => self.pending = count,
            JobStatus::Processing => self.processing = count,
            JobStatus::Done => self.done = count,
            JobStatus::Error => self.error = count,
            JobStatus::Skipped => self.skipped = count,
        }
    }

    pub fn total(&self) -> u64 {
        JobStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("completed".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut meta = JobMetadata::default();
        meta.mark_completed(Stage::Metadata);
        meta.mark_completed(Stage::Metadata);
        meta.mark_completed(Stage::Transcript);
        assert_eq!(meta.completed_stages, vec![Stage::Metadata, Stage::Transcript]);
        assert!(meta.is_completed(Stage::Transcript));
        assert!(!meta.is_completed(Stage::Publish));
    }

    #[test]
    fn test_empty_metadata_serializes_to_empty_object() {
        let json = serde_json::to_string(&JobMetadata::default()).unwrap();
        assert_eq!(json, "{}");
        let back: JobMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(back, JobMetadata::default());
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = JobMetadata {
            video: Some(VideoDetails {
                title: "T".to_string(),
                duration_seconds: 90,
                view_count: 7,
                ..Default::default()
            }),
            transcript: Some(TranscriptOutcome::Unavailable {
                reason: "no captions".to_string(),
            }),
            completed_stages: vec![Stage::Metadata, Stage::DurationGate],
            ..Default::default()
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["video"]["view_count"], 7);
        assert_eq!(value["video"]["duration_seconds"], 90);
        assert_eq!(value["transcript"]["state"], "unavailable");
        assert_eq!(value["completed_stages"][1], "duration_gate");
    }

    #[test]
    fn test_queue_stats_total() {
        let mut stats = QueueStats::default();
        stats.set(JobStatus::Pending, 2);
        stats.set(JobStatus::Done, 3);
        assert_eq!(stats.get(JobStatus::Done), 3);
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn test_enqueue_request_builder() {
        let req = EnqueueRequest::new("abc", "https://youtu.be/abc", SourceKind::Youtube)
            .with_priority(5);
        assert_eq!(req.priority, 5);
        assert!(req.extraction.is_empty());
        assert_eq!(
            EnqueueRequest::new("x", "u", SourceKind::Vimeo).priority,
            DEFAULT_PRIORITY
        );
    }
}
