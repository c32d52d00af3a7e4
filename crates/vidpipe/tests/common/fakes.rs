//! Scripted in-memory gateways.
//!
//! Each fake answers from a per-video (or per-call) script and falls back to
//! a default answer, recording every request it sees.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use vidpipe::gateway::{
    ContentSink, DescriptionGateway, DescriptionRequest, GatewayError, GoldenPrompt,
    MetadataGateway, PromptAuthority, PublishError, PublishRecord, TranscriptGateway,
    TranscriptRequest,
};
use vidpipe::source::SourceKind;
use vidpipe::worker::job::{PublishReceipt, VideoDetails};

use super::builders::{VideoBuilder, DESCRIPTION};

pub fn transport_error(operation: &'static str) -> GatewayError {
    GatewayError::Transport {
        operation,
        message: "connection reset".to_string(),
    }
}

#[derive(Default)]
pub struct FakeMetadata {
    videos: Mutex<HashMap<String, VecDeque<Result<VideoDetails, GatewayError>>>>,
    panics_for: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeMetadata {
    /// Answers `video_id` with `video` on every call.
    pub fn video(&self, video_id: &str, video: VideoDetails) {
        self.script(video_id, vec![Ok(video)]);
    }

    /// Answers `video_id` with each result in turn; the last one repeats.
    pub fn script(&self, video_id: &str, results: Vec<Result<VideoDetails, GatewayError>>) {
        self.videos
            .lock()
            .unwrap()
            .insert(video_id.to_string(), results.into());
    }

    pub fn panic_for(&self, video_id: &str) {
        *self.panics_for.lock().unwrap() = Some(video_id.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataGateway for FakeMetadata {
    async fn fetch_video(
        &self,
        _source: SourceKind,
        video_id: &str,
    ) -> Result<VideoDetails, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics_for.lock().unwrap().as_deref() == Some(video_id) {
            panic!("metadata provider exploded for {}", video_id);
        }
        let mut videos = self.videos.lock().unwrap();
        match videos.get_mut(video_id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) => script.front().cloned().unwrap(),
            None => Ok(VideoBuilder::new(&format!("Video {}", video_id)).build()),
        }
    }
}

#[derive(Default)]
pub struct FakeTranscripts {
    texts: Mutex<HashMap<String, Result<Option<String>, GatewayError>>>,
    requests: Mutex<Vec<TranscriptRequest>>,
}

impl FakeTranscripts {
    pub fn text(&self, video_id: &str, text: &str) {
        self.set(video_id, Ok(Some(text.to_string())));
    }

    pub fn set(&self, video_id: &str, result: Result<Option<String>, GatewayError>) {
        self.texts.lock().unwrap().insert(video_id.to_string(), result);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<TranscriptRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptGateway for FakeTranscripts {
    async fn fetch_transcript(
        &self,
        request: &TranscriptRequest,
    ) -> Result<Option<String>, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        self.texts
            .lock()
            .unwrap()
            .get(&request.video_id)
            .cloned()
            .unwrap_or_else(|| {
                Ok(Some(format!(
                    "Trascrizione di {}: parliamo con Mario Rossi di robotica.",
                    request.video_id
                )))
            })
    }
}

pub struct FakeDescriptions {
    failures: Mutex<VecDeque<GatewayError>>,
    requests: Mutex<Vec<DescriptionRequest>>,
    text: String,
}

impl Default for FakeDescriptions {
    fn default() -> Self {
        Self {
            failures: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            text: DESCRIPTION.to_string(),
        }
    }
}

impl FakeDescriptions {
    /// The next calls fail with these errors, in order.
    pub fn fail_with(&self, errors: Vec<GatewayError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<DescriptionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DescriptionGateway for FakeDescriptions {
    async fn generate_description(
        &self,
        request: &DescriptionRequest,
    ) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.text.clone())
    }
}

/// Remote prompt authority with a fixed answer.
pub struct FakePrompt {
    result: Result<Option<String>, GatewayError>,
}

impl FakePrompt {
    pub fn with(text: &str) -> Self {
        Self {
            result: Ok(Some(text.to_string())),
        }
    }

    pub fn none() -> Self {
        Self { result: Ok(None) }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(transport_error("golden_prompt")),
        }
    }
}

#[async_trait]
impl PromptAuthority for FakePrompt {
    async fn has_golden_prompt(&self) -> Result<bool, GatewayError> {
        self.result.clone().map(|p| p.is_some())
    }

    async fn golden_prompt(&self) -> Result<Option<GoldenPrompt>, GatewayError> {
        self.result.clone().map(|p| {
            p.map(|text| GoldenPrompt {
                text,
                hash: Some("h1".to_string()),
            })
        })
    }
}

/// Sink that keeps the latest record per video.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<PublishRecord>>,
    failures: Mutex<VecDeque<PublishError>>,
}

impl RecordingSink {
    pub fn fail_with(&self, errors: Vec<PublishError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn records(&self) -> Vec<PublishRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn published(&self, video_id: &str) -> Option<PublishRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.video_id == video_id)
            .cloned()
    }
}

#[async_trait]
impl ContentSink for RecordingSink {
    async fn publish(&self, record: &PublishRecord) -> Result<PublishReceipt, PublishError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(PublishReceipt {
            post_id: format!("post-{}", record.video_id),
            location: None,
        })
    }
}
