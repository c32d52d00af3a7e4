//! Remote collaborators of the pipeline.
//!
//! Each external capability sits behind its own trait so the pipeline can
//! be driven by the HTTP [`VendorClient`] in production and by in-memory
//! fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod circuit;
pub mod client;
pub mod error;
pub mod metrics;
mod wire;

pub use circuit::{CircuitBreaker, CircuitState};
pub use client::{HealthStatus, VendorClient};
pub use error::{GatewayError, PublishError};
pub use metrics::{GatewayMetrics, OperationStats};

use crate::config::TranscriptMode;
use crate::extract::Entities;
use crate::source::SourceKind;
use crate::worker::job::{Job, JobMetadata, PublishReceipt, TranscriptOutcome, VideoDetails};

/// Fetches video details from the provider.
#[async_trait]
pub trait MetadataGateway: Send + Sync {
    async fn fetch_video(
        &self,
        source: SourceKind,
        video_id: &str,
    ) -> Result<VideoDetails, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRequest {
    pub video_id: String,
    pub mode: TranscriptMode,
    pub lang: String,
}

/// Fetches transcripts.
///
/// `Ok(None)` means the provider has no transcript for the video; this is
/// an expected outcome, not a failure.
#[async_trait]
pub trait TranscriptGateway: Send + Sync {
    async fn fetch_transcript(
        &self,
        request: &TranscriptRequest,
    ) -> Result<Option<String>, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptionRequest {
    pub transcript: String,
    pub title: String,
    pub custom_prompt: String,
}

/// Generates descriptions. Every call is billed; results are never cached.
#[async_trait]
pub trait DescriptionGateway: Send + Sync {
    async fn generate_description(
        &self,
        request: &DescriptionRequest,
    ) -> Result<String, GatewayError>;
}

/// A prompt published by the vendor for a license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldenPrompt {
    pub text: String,
    pub hash: Option<String>,
}

/// Source of remote prompts. Prompts are never cached or persisted.
#[async_trait]
pub trait PromptAuthority: Send + Sync {
    /// Cheap check whether a prompt exists for this license.
    async fn has_golden_prompt(&self) -> Result<bool, GatewayError>;

    /// Fetches the prompt; `Ok(None)` when the license has none.
    async fn golden_prompt(&self) -> Result<Option<GoldenPrompt>, GatewayError>;
}

/// Everything the host content store needs to create or update a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub job_id: i64,
    pub video_id: String,
    pub source_kind: SourceKind,
    pub source_url: String,
    pub video: VideoDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub entities: Entities,
    pub transcript_available: bool,
}

impl PublishRecord {
    /// Assembles the record from a job and its current metadata. `None`
    /// until the metadata stage has stored the video details.
    pub fn from_job(job: &Job, metadata: &JobMetadata) -> Option<Self> {
        let video = metadata.video.clone()?;
        Some(Self {
            job_id: job.id.0,
            video_id: job.video_id.clone(),
            source_kind: job.source_kind,
            source_url: job.source_url.clone(),
            video,
            description: metadata.description.as_ref().map(|d| d.text.clone()),
            entities: metadata.entities.clone().unwrap_or_default(),
            transcript_available: metadata
                .transcript
                .as_ref()
                .is_some_and(TranscriptOutcome::is_available),
        })
    }
}

/// Host content store receiving enriched videos.
///
/// Publishing the same video twice must update rather than duplicate.
#[async_trait]
pub trait ContentSink: Send + Sync {
    async fn publish(&self, record: &PublishRecord) -> Result<PublishReceipt, PublishError>;
}
