//! Operator-facing facade over the queue.
//!
//! [`VideoQueue`] bundles the job store, the runner and the publish sink
//! and exposes the verbs a host (the CLI, a cron hook) calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod listing;

pub use listing::{ListFormat, VideoListing};

use crate::config::{Config, QueueConfig};
use crate::db::stats_repo::{self, VideoSummary};
use crate::db::Database;
use crate::error::Result;
use crate::extract::ExtractionOverrides;
use crate::gateway::{ContentSink, HealthStatus, OperationStats, PublishRecord, VendorClient};
use crate::pipeline::{Gateways, JobProgress, Pipeline, PipelineSettings};
use crate::source;
use crate::storage::FileSink;
use crate::worker::{
    BatchReport, EnqueueRequest, Job, JobFilter, JobId, JobStatus, JobStore, QueueStats, Runner,
    StoreError, DEFAULT_PRIORITY,
};

/// Result of importing a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub job_id: JobId,
    /// False when the video already had an active job.
    pub created: bool,
    pub source: String,
    pub video_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub queue: QueueStats,
    pub videos: VideoSummary,
    pub gateway: BTreeMap<String, OperationStats>,
}

impl StatsReport {
    pub fn total_duration_hours(&self) -> f64 {
        self.videos.total_duration_secs as f64 / 3600.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeReport {
    pub orphaned_transcripts: usize,
    pub caches_cleared: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailReport {
    pub updated: usize,
    pub unchanged: usize,
    /// Jobs whose source has no derivable thumbnail, or that have no video
    /// details yet.
    pub skipped: usize,
    pub republished: usize,
    pub failed: usize,
}

pub struct VideoQueue {
    store: JobStore,
    runner: Arc<Runner>,
    sink: Arc<dyn ContentSink>,
    vendor: Option<VendorClient>,
}

impl VideoQueue {
    /// Opens the database and wires the vendor client and file sink from
    /// `config`. Progress of every job goes to `events` when given.
    pub fn open(config: &Config, events: Option<broadcast::Sender<JobProgress>>) -> Result<Self> {
        let store = JobStore::new(Database::open(&config.database_path())?);
        let client = VendorClient::from_config(&config.vendor)?;
        let prompt_license = config.vendor.prompt_license_key()?;
        let sink: Arc<dyn ContentSink> = Arc::new(FileSink::new(config.output_directory()));
        let gateways = Gateways::from_vendor(client.clone(), prompt_license, sink);

        let mut queue = Self::new(
            store,
            gateways,
            PipelineSettings::from_config(config),
            config.queue.clone(),
            events,
        );
        queue.vendor = Some(client);
        Ok(queue)
    }

    /// Builds a queue around explicit collaborators.
    pub fn new(
        store: JobStore,
        gateways: Gateways,
        settings: PipelineSettings,
        queue: QueueConfig,
        events: Option<broadcast::Sender<JobProgress>>,
    ) -> Self {
        let sink = Arc::clone(&gateways.sink);
        let pipeline = Arc::new(Pipeline::new(Arc::new(settings), gateways, store.clone()));
        let mut runner = Runner::new(store.clone(), pipeline, queue);
        if let Some(sender) = events {
            runner = runner.with_events(sender);
        }
        Self {
            store,
            runner: Arc::new(runner),
            sink,
            vendor: None,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Shared runner, for handing to a [`crate::worker::Scheduler`].
    pub fn runner(&self) -> Arc<Runner> {
        Arc::clone(&self.runner)
    }

    pub fn vendor(&self) -> Option<&VendorClient> {
        self.vendor.as_ref()
    }

    /// Detects the source of `url` and enqueues it.
    pub fn import(&self, url: &str) -> Result<ImportOutcome> {
        self.import_with(url, DEFAULT_PRIORITY, ExtractionOverrides::default())
    }

    pub fn import_with(
        &self,
        url: &str,
        priority: i32,
        extraction: ExtractionOverrides,
    ) -> Result<ImportOutcome> {
        let detected = source::detect(url)?;
        let request = EnqueueRequest::new(&detected.video_id, &detected.url, detected.kind)
            .with_priority(priority)
            .with_extraction(extraction);
        let enqueued = self.store.enqueue_request(&request)?;

        if enqueued.created {
            info!(job_id = %enqueued.id, video_id = %detected.video_id, "Imported {}", detected.kind);
        } else {
            info!(job_id = %enqueued.id, "Video {} is already queued", detected.video_id);
        }
        Ok(ImportOutcome {
            job_id: enqueued.id,
            created: enqueued.created,
            source: detected.kind.to_string(),
            video_id: detected.video_id,
        })
    }

    /// Listing rows for the jobs matching `filter`.
    pub fn listing(&self, filter: &JobFilter) -> Result<Vec<VideoListing>> {
        let (jobs, _) = self.store.list(filter)?;
        Ok(jobs.iter().map(VideoListing::from).collect())
    }

    /// Renders the jobs matching `filter` in `format`.
    pub fn list(&self, format: ListFormat, filter: &JobFilter) -> Result<String> {
        listing::render(&self.listing(filter)?, format)
    }

    pub fn stats(&self) -> Result<StatsReport> {
        Ok(StatsReport {
            queue: self.store.stats()?,
            videos: stats_repo::video_summary(self.store.database())?,
            gateway: self.vendor.as_ref().map(VendorClient::metrics).unwrap_or_default(),
        })
    }

    /// Removes orphaned transcripts, compacts the database and drops the
    /// gateway response caches.
    pub fn optimize(&self) -> Result<OptimizeReport> {
        let orphaned_transcripts = self.store.database().optimize()?;
        let caches_cleared = match &self.vendor {
            Some(client) => {
                client.clear_caches();
                true
            }
            None => false,
        };
        info!(orphaned_transcripts, caches_cleared, "Optimization finished");
        Ok(OptimizeReport {
            orphaned_transcripts,
            caches_cleared,
        })
    }

    /// Resets every job's thumbnail to the one derived from its video id
    /// and republishes finished jobs whose thumbnail changed. Jobs being
    /// processed are left alone.
    pub async fn regenerate_thumbnails(&self, job_id: Option<JobId>) -> Result<ThumbnailReport> {
        let jobs = match job_id {
            Some(id) => vec![self.store.get(id)?.ok_or(StoreError::NotFound(id))?],
            None => self.all_jobs()?,
        };

        let mut report = ThumbnailReport::default();
        for job in jobs {
            if job.status == JobStatus::Processing {
                report.skipped += 1;
                continue;
            }
            let Some(url) = job.source_kind.derived_thumbnail_url(&job.video_id) else {
                report.skipped += 1;
                continue;
            };

            let mut metadata = job.metadata.clone();
            let Some(video) = metadata.video.as_mut() else {
                report.skipped += 1;
                continue;
            };
            if video.thumbnail_url.as_deref() == Some(url.as_str()) {
                report.unchanged += 1;
                continue;
            }
            video.thumbnail_url = Some(url);
            self.store.update_metadata(job.id, &metadata)?;
            report.updated += 1;

            if job.status != JobStatus::Done || metadata.publish.is_none() {
                continue;
            }
            let Some(record) = PublishRecord::from_job(&job, &metadata) else {
                continue;
            };
            match self.sink.publish(&record).await {
                Ok(receipt) => {
                    metadata.publish = Some(receipt);
                    self.store.update_metadata(job.id, &metadata)?;
                    report.republished += 1;
                }
                Err(e) => {
                    warn!("Republishing job {} failed: {}", job.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            updated = report.updated,
            republished = report.republished,
            "Thumbnails regenerated"
        );
        Ok(report)
    }

    fn all_jobs(&self) -> Result<Vec<Job>> {
        const PAGE: u64 = 200;
        let mut jobs = Vec::new();
        loop {
            let filter = JobFilter {
                limit: Some(PAGE),
                offset: Some(jobs.len() as u64),
                ..Default::default()
            };
            let (page, total) = self.store.list(&filter)?;
            let fetched = page.len() as u64;
            jobs.extend(page);
            if fetched < PAGE || jobs.len() as u64 >= total {
                return Ok(jobs);
            }
        }
    }

    /// Operator retry of an `error` or `skipped` job.
    pub fn retry(&self, id: JobId) -> Result<()> {
        Ok(self.store.retry(id)?)
    }

    pub fn delete(&self, id: JobId) -> Result<()> {
        Ok(self.store.delete(id)?)
    }

    /// Runs a single scheduler tick in the caller's runtime.
    pub async fn run_once(&self) -> Result<BatchReport> {
        Ok(self.runner.tick().await?)
    }

    /// Vendor health probe; `None` when no vendor client is wired.
    pub async fn health(&self) -> Option<Result<HealthStatus>> {
        let client = self.vendor.as_ref()?;
        Some(client.health().await.map_err(Into::into))
    }
}
