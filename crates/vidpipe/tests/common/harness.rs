//! Test harness for isolated queue execution.
//!
//! The `TestHarness` struct wires an in-memory job store to the scripted
//! fakes, and builds pipelines, runners and queues over them.

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::broadcast;

use vidpipe::config::QueueConfig;
use vidpipe::db::Database;
use vidpipe::gateway::{ContentSink, PromptAuthority};
use vidpipe::pipeline::{
    DiscardProgress, Gateways, JobProgress, Pipeline, PipelineContext, PipelineOutcome,
    PipelineSettings,
};
use vidpipe::service::VideoQueue;
use vidpipe::source::SourceKind;
use vidpipe::worker::{Job, JobId, JobStore, Runner};

use super::builders::{queue_config, youtube_url};
use super::fakes::{FakeDescriptions, FakeMetadata, FakeTranscripts, RecordingSink};

pub struct TestHarness {
    pub store: JobStore,
    pub metadata: Arc<FakeMetadata>,
    pub transcripts: Arc<FakeTranscripts>,
    pub descriptions: Arc<FakeDescriptions>,
    pub sink: Arc<RecordingSink>,
    pub personalized_prompt: Option<Arc<dyn PromptAuthority>>,
    pub legacy_prompt: Option<Arc<dyn PromptAuthority>>,
    pub settings: PipelineSettings,
    pub queue: QueueConfig,
}

impl TestHarness {
    /// Harness over a fresh in-memory database with default settings.
    pub fn new() -> Self {
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        Self::with_store(JobStore::new(db))
    }

    pub fn with_store(store: JobStore) -> Self {
        Self {
            store,
            metadata: Arc::new(FakeMetadata::default()),
            transcripts: Arc::new(FakeTranscripts::default()),
            descriptions: Arc::new(FakeDescriptions::default()),
            sink: Arc::new(RecordingSink::default()),
            personalized_prompt: None,
            legacy_prompt: None,
            settings: PipelineSettings::default(),
            queue: queue_config(10, 3),
        }
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn prompts(
        mut self,
        personalized: Option<Arc<dyn PromptAuthority>>,
        legacy: Option<Arc<dyn PromptAuthority>>,
    ) -> Self {
        self.personalized_prompt = personalized;
        self.legacy_prompt = legacy;
        self
    }

    pub fn gateways(&self) -> Gateways {
        self.gateways_with_sink(self.sink.clone())
    }

    pub fn gateways_with_sink(&self, sink: Arc<dyn ContentSink>) -> Gateways {
        Gateways {
            metadata: self.metadata.clone(),
            transcript: self.transcripts.clone(),
            description: self.descriptions.clone(),
            personalized_prompt: self.personalized_prompt.clone(),
            legacy_prompt: self.legacy_prompt.clone(),
            sink,
        }
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            Arc::new(self.settings.clone()),
            self.gateways(),
            self.store.clone(),
        ))
    }

    pub fn runner(&self) -> Runner {
        Runner::new(self.store.clone(), self.pipeline(), self.queue.clone())
    }

    pub fn runner_with_events(&self) -> (Runner, broadcast::Receiver<JobProgress>) {
        let (tx, rx) = broadcast::channel(256);
        (self.runner().with_events(tx), rx)
    }

    pub fn video_queue(&self) -> VideoQueue {
        VideoQueue::new(
            self.store.clone(),
            self.gateways(),
            self.settings.clone(),
            self.queue.clone(),
            None,
        )
    }

    pub fn video_queue_with_sink(&self, sink: Arc<dyn ContentSink>) -> VideoQueue {
        VideoQueue::new(
            self.store.clone(),
            self.gateways_with_sink(sink),
            self.settings.clone(),
            self.queue.clone(),
            None,
        )
    }

    /// Enqueues a YouTube video.
    pub fn enqueue(&self, video_id: &str) -> JobId {
        self.store
            .enqueue(video_id, &youtube_url(video_id), SourceKind::Youtube)
            .expect("Failed to enqueue")
    }

    /// Claims the next job, as the runner would.
    pub fn claim_one(&self) -> Job {
        self.store
            .dequeue_batch(1)
            .expect("Failed to dequeue")
            .pop()
            .expect("No job to claim")
    }

    /// Claims `id` and runs the pipeline over it without settling.
    pub async fn run_pipeline(&self, id: JobId) -> PipelineOutcome {
        let job = self.claim_one();
        assert_eq!(job.id, id, "claimed an unexpected job");
        self.pipeline()
            .run(PipelineContext::new(job), &DiscardProgress)
            .await
    }

    pub fn job(&self, id: JobId) -> Job {
        self.store
            .get(id)
            .expect("Failed to load job")
            .expect("Job missing")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
