//! Typed queue API over the `jobs` table.

use std::time::Duration;

use chrono::Utc;

use super::error::StoreError;
use super::job::{
    Claim, Enqueued, EnqueueRequest, Job, JobId, JobMetadata, JobStatus, QueueStats,
};
use crate::db::job_repo::{self, JobRow, NewJobRow};
use crate::db::{format_timestamp, parse_timestamp, Database};
use crate::source::SourceKind;

/// Typed listing filter.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub source_kind: Option<SourceKind>,
    pub video_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl From<&JobFilter> for job_repo::JobFilter {
    fn from(filter: &JobFilter) -> Self {
        Self {
            status: filter.status.map(|s| s.as_str().to_string()),
            source_kind: filter.source_kind.map(|k| k.as_str().to_string()),
            video_id: filter.video_id.clone(),
            limit: filter.limit,
            offset: filter.offset,
        }
    }
}

/// Persistent job queue.
///
/// Cloning is cheap; all clones share the same database handle.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Enqueues a video with default priority, returning the id of the new
    /// job or of the already active job for the same video.
    pub fn enqueue(
        &self,
        video_id: &str,
        url: &str,
        source: SourceKind,
    ) -> Result<JobId, StoreError> {
        self.enqueue_request(&EnqueueRequest::new(video_id, url, source))
            .map(|e| e.id)
    }

    /// Enqueues with explicit priority and extraction overrides.
    pub fn enqueue_request(&self, request: &EnqueueRequest) -> Result<Enqueued, StoreError> {
        let video_id = request.video_id.trim();
        if video_id.is_empty() {
            return Err(StoreError::InvalidInput("video id must not be empty".to_string()));
        }

        let metadata = JobMetadata {
            extraction: request.extraction,
            ..Default::default()
        };
        let metadata = serde_json::to_string(&metadata)?;
        let now = format_timestamp(Utc::now());

        let (id, created) = job_repo::insert_unless_active(
            &self.db,
            &NewJobRow {
                video_id,
                source_url: &request.source_url,
                source_kind: request.source_kind.as_str(),
                priority: request.priority,
                metadata: &metadata,
                now: &now,
            },
        )?;

        if created {
            log::info!("Enqueued job {} for {} video {}", id, request.source_kind, video_id);
        } else {
            log::debug!("Video {} already queued as job {}", video_id, id);
        }

        Ok(Enqueued {
            id: JobId(id),
            created,
        })
    }

    /// Claims up to `max_n` jobs for processing.
    ///
    /// All returned jobs share one fresh claim token. Concurrent callers
    /// never receive the same job.
    pub fn dequeue_batch(&self, max_n: u32) -> Result<Vec<Job>, StoreError> {
        if max_n == 0 {
            return Ok(Vec::new());
        }
        let token = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        let rows = job_repo::claim_pending(&self.db, max_n, &now, &token)?;
        if !rows.is_empty() {
            log::debug!("Claimed {} job(s) with token {}", rows.len(), token);
        }
        rows.into_iter().map(job_from_row).collect()
    }

    pub fn mark_done(&self, claim: &Claim, metadata: &JobMetadata) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(metadata)?;
        self.finish(claim, JobStatus::Done, None, Some(&metadata))
    }

    pub fn mark_error(&self, claim: &Claim, error: &str) -> Result<(), StoreError> {
        self.finish(claim, JobStatus::Error, Some(error), None)
    }

    /// Skips a job by policy; the reason is also stored on the metadata.
    pub fn mark_skipped(&self, claim: &Claim, reason: &str) -> Result<(), StoreError> {
        let mut metadata = self.require(claim.id)?.metadata;
        metadata.skip_reason = Some(reason.to_string());
        let metadata = serde_json::to_string(&metadata)?;
        self.finish(claim, JobStatus::Skipped, Some(reason), Some(&metadata))
    }

    fn finish(
        &self,
        claim: &Claim,
        status: JobStatus,
        last_error: Option<&str>,
        metadata: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = format_timestamp(Utc::now());
        let finished = job_repo::finish(
            &self.db,
            claim.id.0,
            &claim.token,
            status.as_str(),
            last_error,
            metadata,
            &now,
        )?;
        if finished {
            log::info!("Job {} -> {}", claim.id, status);
            Ok(())
        } else {
            Err(self.claim_error(claim, status.as_str()))
        }
    }

    /// Returns a job that failed transiently to `pending`, keeping its
    /// checkpoint metadata and attempt count. It becomes claimable again
    /// after `delay`.
    pub fn release(
        &self,
        claim: &Claim,
        error: &str,
        metadata: &JobMetadata,
        delay: Duration,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| StoreError::InvalidInput(format!("release delay: {}", e)))?;
        let metadata = serde_json::to_string(metadata)?;
        let released = job_repo::release(
            &self.db,
            claim.id.0,
            &claim.token,
            error,
            &metadata,
            &format_timestamp(now + delay),
            &format_timestamp(now),
        )?;
        if released {
            log::info!(
                "Job {} released for retry in {}s: {}",
                claim.id,
                delay.num_seconds(),
                error
            );
            Ok(())
        } else {
            Err(self.claim_error(claim, "release"))
        }
    }

    /// Persists checkpoint metadata of a job being processed under `claim`.
    pub fn checkpoint(&self, claim: &Claim, metadata: &JobMetadata) -> Result<(), StoreError> {
        let json = serde_json::to_string(metadata)?;
        let now = format_timestamp(Utc::now());
        if job_repo::checkpoint(&self.db, claim.id.0, &claim.token, &json, &now)? {
            Ok(())
        } else {
            Err(self.claim_error(claim, "checkpoint"))
        }
    }

    /// Operator retry: resets an `error` or `skipped` job to `pending` with
    /// a fresh attempt budget. Checkpoint metadata is kept.
    pub fn retry(&self, id: JobId) -> Result<(), StoreError> {
        let now = format_timestamp(Utc::now());
        if job_repo::reset_for_retry(&self.db, id.0, &now)? {
            log::info!("Job {} reset to pending by operator", id);
            Ok(())
        } else {
            Err(self.transition_error(id, "retry"))
        }
    }

    fn claim_error(&self, claim: &Claim, action: &'static str) -> StoreError {
        match self.get(claim.id) {
            Ok(Some(job))
                if job.status == JobStatus::Processing
                    && job.claim_token.as_deref() != Some(claim.token.as_str()) =>
            {
                log::warn!("Job {} was claimed by another worker, dropping {}", claim.id, action);
                StoreError::ClaimLost(claim.id)
            }
            _ => self.transition_error(claim.id, action),
        }
    }

    fn transition_error(&self, id: JobId, action: &'static str) -> StoreError {
        match self.get(id) {
            Ok(Some(job)) => StoreError::InvalidTransition {
                id,
                status: job.status,
                action,
            },
            Ok(None) => StoreError::NotFound(id),
            Err(e) => e,
        }
    }

    /// Job counts per status.
    pub fn stats(&self) -> Result<QueueStats, StoreError> {
        let mut stats = QueueStats::default();
        for (status, count) in job_repo::count_by_status(&self.db)? {
            match status.parse::<JobStatus>() {
                Ok(status) => stats.set(status, count),
                Err(e) => log::warn!("Ignoring {} job(s): {}", count, e),
            }
        }
        Ok(stats)
    }

    pub fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        job_repo::find_by_id(&self.db, id.0)?
            .map(job_from_row)
            .transpose()
    }

    fn require(&self, id: JobId) -> Result<Job, StoreError> {
        self.get(id)?.ok_or(StoreError::NotFound(id))
    }

    /// Lists jobs, newest first, with the total number of matches.
    pub fn list(&self, filter: &JobFilter) -> Result<(Vec<Job>, u64), StoreError> {
        let (rows, total) = job_repo::query(&self.db, &filter.into())?;
        let jobs = rows
            .into_iter()
            .map(job_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((jobs, total))
    }

    /// Deletes a job. Jobs currently being processed cannot be deleted.
    pub fn delete(&self, id: JobId) -> Result<(), StoreError> {
        let job = self.require(id)?;
        if job.status == JobStatus::Processing {
            return Err(StoreError::InvalidTransition {
                id,
                status: job.status,
                action: "delete",
            });
        }
        if !job_repo::delete(&self.db, id.0)? {
            return Err(StoreError::NotFound(id));
        }
        log::info!("Deleted job {}", id);
        Ok(())
    }

    /// Deletes every job with `status`, except `processing`.
    pub fn delete_by_status(&self, status: JobStatus) -> Result<usize, StoreError> {
        if status == JobStatus::Processing {
            return Err(StoreError::InvalidInput(
                "jobs being processed cannot be deleted".to_string(),
            ));
        }
        let removed = job_repo::delete_by_status(&self.db, status.as_str())?;
        log::info!("Deleted {} {} job(s)", removed, status);
        Ok(removed)
    }

    /// Takes back jobs left in `processing` for longer than `older_than`.
    /// Such jobs belong to a run that was interrupted. Jobs with attempts
    /// left return to `pending`; the others end in `error`. Returns the
    /// number of jobs taken back.
    pub fn recover_stale(
        &self,
        older_than: Duration,
        max_attempts: u32,
    ) -> Result<usize, StoreError> {
        let now = Utc::now();
        let older_than = chrono::Duration::from_std(older_than)
            .map_err(|e| StoreError::InvalidInput(format!("stale threshold: {}", e)))?;
        let (requeued, abandoned) = job_repo::recover_stale(
            &self.db,
            &format_timestamp(now - older_than),
            &format_timestamp(now),
            max_attempts,
        )?;
        if requeued > 0 {
            log::warn!("Recovered {} stale processing job(s)", requeued);
        }
        if abandoned > 0 {
            log::warn!(
                "{} stale job(s) had no attempts left and were marked as errors",
                abandoned
            );
        }
        Ok(requeued + abandoned)
    }

    /// Stores the transcript fetched for a job being processed under `claim`.
    pub fn save_transcript(
        &self,
        claim: &Claim,
        video_id: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let now = format_timestamp(Utc::now());
        if job_repo::upsert_transcript(&self.db, claim.id.0, &claim.token, video_id, text, &now)? {
            Ok(())
        } else {
            Err(self.claim_error(claim, "save transcript for"))
        }
    }

    pub fn transcript(&self, id: JobId) -> Result<Option<String>, StoreError> {
        Ok(job_repo::find_transcript(&self.db, id.0)?)
    }

    /// Operator edit of a job's metadata. Jobs being processed are refused;
    /// their owner writes through [`JobStore::checkpoint`].
    pub fn update_metadata(&self, id: JobId, metadata: &JobMetadata) -> Result<(), StoreError> {
        let json = serde_json::to_string(metadata)?;
        let now = format_timestamp(Utc::now());
        if job_repo::update_metadata(&self.db, id.0, &json, &now)? {
            Ok(())
        } else {
            Err(self.transition_error(id, "update metadata of"))
        }
    }
}

fn job_from_row(row: JobRow) -> Result<Job, StoreError> {
    let id = JobId(row.id);
    let corrupt = |reason: String| StoreError::Corrupt { id, reason };

    let status = row.status.parse::<JobStatus>().map_err(corrupt)?;
    let source_kind = row
        .source_kind
        .parse::<SourceKind>()
        .map_err(|e| corrupt(e.to_string()))?;
    let metadata: JobMetadata = serde_json::from_str(&row.metadata)
        .map_err(|e| corrupt(format!("metadata: {}", e)))?;

    Ok(Job {
        id,
        video_id: row.video_id,
        source_url: row.source_url,
        source_kind,
        status,
        priority: row.priority,
        attempts: row.attempts,
        last_error: row.last_error,
        metadata,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
        processed_at: row.processed_at.as_deref().map(parse_timestamp),
        available_at: parse_timestamp(&row.available_at),
        claim_token: row.claim_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionOverrides;
    use crate::worker::job::{Stage, VideoDetails};

    fn store() -> JobStore {
        JobStore::new(Database::open_in_memory().unwrap())
    }

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn claim_next(store: &JobStore) -> Claim {
        store.dequeue_batch(1).unwrap()[0].claim().unwrap()
    }

    #[test]
    fn test_enqueue_is_idempotent_while_active() {
        let store = store();
        let a = store.enqueue("dQw4w9WgXcQ", URL, SourceKind::Youtube).unwrap();
        let b = store.enqueue("dQw4w9WgXcQ", URL, SourceKind::Youtube).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.stats().unwrap().pending, 1);
    }

    #[test]
    fn test_enqueue_rejects_empty_video_id() {
        let store = store();
        let err = store.enqueue("  ", URL, SourceKind::Youtube).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn test_enqueue_request_stores_overrides() {
        let store = store();
        let overrides = ExtractionOverrides {
            speakers: Some(false),
            ..Default::default()
        };
        let enqueued = store
            .enqueue_request(
                &EnqueueRequest::new("v1", URL, SourceKind::Youtube)
                    .with_priority(1)
                    .with_extraction(overrides),
            )
            .unwrap();
        assert!(enqueued.created);

        let job = store.get(enqueued.id).unwrap().unwrap();
        assert_eq!(job.priority, 1);
        assert_eq!(job.metadata.extraction, overrides);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_dequeue_marks_processing() {
        let store = store();
        let id = store.enqueue("v1", URL, SourceKind::Youtube).unwrap();
        let batch = store.dequeue_batch(5).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, id);
        assert_eq!(batch[0].status, JobStatus::Processing);
        assert_eq!(batch[0].attempts, 1);
        assert!(batch[0].claim_token.is_some());
        assert!(store.dequeue_batch(5).unwrap().is_empty());
        assert!(store.dequeue_batch(0).unwrap().is_empty());
    }

    #[test]
    fn test_mark_done_persists_metadata() {
        let store = store();
        let id = store.enqueue("v1", URL, SourceKind::Youtube).unwrap();
        let claim = claim_next(&store);

        let mut meta = JobMetadata::default();
        meta.video = Some(VideoDetails {
            title: "Title".to_string(),
            ..Default::default()
        });
        meta.mark_completed(Stage::Metadata);
        store.mark_done(&claim, &meta).unwrap();

        let job = store.get(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.processed_at.is_some());
        assert_eq!(job.metadata, meta);
        assert_eq!(job.title(), "Title");
    }

    #[test]
    fn test_mark_requires_processing() {
        let store = store();
        let id = store.enqueue("v1", URL, SourceKind::Youtube).unwrap();
        let forged = Claim {
            id,
            token: "forged".to_string(),
        };
        let err = store.mark_error(&forged, "boom").unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                status: JobStatus::Pending,
                ..
            }
        ));
        let missing = Claim {
            id: JobId(999),
            token: "forged".to_string(),
        };
        assert!(matches!(
            store.mark_error(&missing, "boom").unwrap_err(),
            StoreError::NotFound(JobId(999))
        ));
    }

    #[test]
    fn test_mark_skipped_records_reason() {
        let store = store();
        let id = store.enqueue("v1", URL, SourceKind::Youtube).unwrap();
        let claim = claim_next(&store);
        store.mark_skipped(&claim, "too short").unwrap();

        let job = store.get(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Skipped);
        assert_eq!(job.metadata.skip_reason.as_deref(), Some("too short"));
    }

    #[test]
    fn test_retry_resets_attempts_and_keeps_checkpoints() {
        let store = store();
        let id = store.enqueue("v1", URL, SourceKind::Youtube).unwrap();
        let claim = claim_next(&store);
        let mut meta = JobMetadata::default();
        meta.mark_completed(Stage::Metadata);
        store.checkpoint(&claim, &meta).unwrap();
        store.mark_error(&claim, "boom").unwrap();

        store.retry(id).unwrap();
        let job = store.get(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.is_none());
        assert!(job.metadata.is_completed(Stage::Metadata));

        // Only error/skipped jobs can be retried.
        assert!(store.retry(id).is_err());
    }

    #[test]
    fn test_release_defers_claim() {
        let store = store();
        let id = store.enqueue("v1", URL, SourceKind::Youtube).unwrap();
        let claim = claim_next(&store);
        store
            .release(&claim, "timeout", &JobMetadata::default(), Duration::from_secs(3600))
            .unwrap();

        let job = store.get(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("timeout"));
        assert!(store.dequeue_batch(1).unwrap().is_empty());
    }

    #[test]
    fn test_release_with_zero_delay_is_claimable() {
        let store = store();
        store.enqueue("v1", URL, SourceKind::Youtube).unwrap();
        let claim = claim_next(&store);
        store
            .release(&claim, "timeout", &JobMetadata::default(), Duration::ZERO)
            .unwrap();

        let batch = store.dequeue_batch(1).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].attempts, 2);
    }

    #[test]
    fn test_stats_always_has_all_statuses() {
        let store = store();
        assert_eq!(store.stats().unwrap(), QueueStats::default());

        store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        store.enqueue("b", URL, SourceKind::Youtube).unwrap();
        store.dequeue_batch(1).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.total(), 2);
    }

    #[test]
    fn test_delete_rules() {
        let store = store();
        let a = store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        let b = store.enqueue("b", URL, SourceKind::Youtube).unwrap();
        store.dequeue_batch(1).unwrap();

        assert!(store.delete(a).is_err());
        store.delete(b).unwrap();
        assert!(matches!(store.delete(b).unwrap_err(), StoreError::NotFound(_)));
        assert!(store.delete_by_status(JobStatus::Processing).is_err());
    }

    #[test]
    fn test_list_with_filter() {
        let store = store();
        store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        store
            .enqueue("123", "https://vimeo.com/123", SourceKind::Vimeo)
            .unwrap();

        let (jobs, total) = store
            .list(&JobFilter {
                source_kind: Some(SourceKind::Vimeo),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(jobs[0].video_id, "123");
    }

    #[test]
    fn test_recover_stale() {
        let store = store();
        let id = store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        store.dequeue_batch(1).unwrap();

        assert_eq!(store.recover_stale(Duration::from_secs(3600), 3).unwrap(), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.recover_stale(Duration::from_millis(1), 3).unwrap(), 1);
        assert_eq!(store.get(id).unwrap().unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_recover_stale_fails_jobs_out_of_attempts() {
        let store = store();
        let id = store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        claim_next(&store);
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.recover_stale(Duration::from_millis(1), 1).unwrap(), 1);
        let job = store.get(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.last_error.unwrap().contains("last attempt"));
        assert!(store.dequeue_batch(1).unwrap().is_empty());
    }

    #[test]
    fn test_stale_owner_cannot_settle_reclaimed_job() {
        let store = store();
        let id = store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        let stale = claim_next(&store);
        std::thread::sleep(Duration::from_millis(5));
        store.recover_stale(Duration::from_millis(1), 3).unwrap();
        let current = claim_next(&store);
        assert_ne!(stale.token, current.token);

        assert!(matches!(
            store.mark_error(&stale, "late failure").unwrap_err(),
            StoreError::ClaimLost(_)
        ));
        assert!(matches!(
            store.checkpoint(&stale, &JobMetadata::default()).unwrap_err(),
            StoreError::ClaimLost(_)
        ));
        assert!(store
            .release(&stale, "late", &JobMetadata::default(), Duration::ZERO)
            .is_err());
        assert_eq!(store.get(id).unwrap().unwrap().status, JobStatus::Processing);

        store.mark_done(&current, &JobMetadata::default()).unwrap();
        let job = store.get(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.claim_token.is_none());

        // Once finished, the old claim is simply out of date.
        assert!(matches!(
            store.mark_error(&stale, "late failure").unwrap_err(),
            StoreError::InvalidTransition {
                status: JobStatus::Done,
                ..
            }
        ));
    }

    #[test]
    fn test_operator_metadata_edit_skips_processing_jobs() {
        let store = store();
        let id = store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        store.update_metadata(id, &JobMetadata::default()).unwrap();
        claim_next(&store);
        assert!(matches!(
            store.update_metadata(id, &JobMetadata::default()).unwrap_err(),
            StoreError::InvalidTransition {
                status: JobStatus::Processing,
                ..
            }
        ));
    }

    #[test]
    fn test_transcript_storage() {
        let store = store();
        let id = store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        assert!(store.transcript(id).unwrap().is_none());
        let claim = claim_next(&store);
        store.save_transcript(&claim, "a", "hello world").unwrap();
        assert_eq!(store.transcript(id).unwrap().as_deref(), Some("hello world"));
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let store = store();
        let id = store.enqueue("a", URL, SourceKind::Youtube).unwrap();
        store
            .database()
            .with_conn(|conn| {
                conn.execute("UPDATE jobs SET metadata = 'not json'", [])?;
                Ok(())
            })
            .unwrap();
        assert!(matches!(
            store.get(id).unwrap_err(),
            StoreError::Corrupt { .. }
        ));
    }
}
