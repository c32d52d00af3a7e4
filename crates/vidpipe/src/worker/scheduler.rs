//! Batch runner and periodic scheduler.
//!
//! [`Runner::run_batch`] claims a batch and drives each job through the
//! pipeline, one at a time. [`Scheduler`] calls it on a fixed interval from
//! a background thread and can be woken early through a broadcast trigger.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::broadcast;

use super::error::StoreError;
use super::job::{Claim, Job, JobMetadata};
use super::store::JobStore;
use crate::config::QueueConfig;
use crate::pipeline::{
    BroadcastProgress, DiscardProgress, FailureClass, JobProgress, Pipeline, PipelineContext,
    PipelineOutcome, ProgressObserver, StageError,
};
use crate::sanitize::sanitize_error_message;

/// Where a job ended up after one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Done,
    Skipped,
    /// Transient failure; back to `pending` with a backoff delay.
    Released,
    Failed,
}

/// Counters for one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub recovered: usize,
    pub claimed: usize,
    pub done: usize,
    pub skipped: usize,
    pub released: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Done => self.done += 1,
            Disposition::Skipped => self.skipped += 1,
            Disposition::Released => self.released += 1,
            Disposition::Failed => self.failed += 1,
        }
    }
}

pub struct Runner {
    store: JobStore,
    pipeline: Arc<Pipeline>,
    queue: QueueConfig,
    events: Option<broadcast::Sender<JobProgress>>,
}

impl Runner {
    pub fn new(store: JobStore, pipeline: Arc<Pipeline>, queue: QueueConfig) -> Self {
        Self {
            store,
            pipeline,
            queue,
            events: None,
        }
    }

    /// Publishes per-stage progress of every job to `sender`.
    pub fn with_events(mut self, sender: broadcast::Sender<JobProgress>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// One scheduler tick: recover interrupted jobs, then run a batch.
    pub async fn tick(&self) -> Result<BatchReport, StoreError> {
        let recovered = self
            .store
            .recover_stale(
                Duration::from_secs(self.queue.stale_after_secs),
                self.queue.max_attempts,
            )?;
        let mut report = self.run_batch().await?;
        report.recovered = recovered;
        Ok(report)
    }

    /// Claims up to `batch_size` jobs and processes them sequentially.
    ///
    /// A failing or panicking job never stops the batch; its outcome is
    /// recorded and the next job runs.
    pub async fn run_batch(&self) -> Result<BatchReport, StoreError> {
        let jobs = self.store.dequeue_batch(self.queue.batch_size)?;
        let mut report = BatchReport {
            claimed: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            let disposition = self.process(job).await;
            report.record(disposition);
        }

        if report.claimed > 0 {
            log::info!(
                "Batch finished: {} claimed, {} done, {} skipped, {} released, {} failed",
                report.claimed,
                report.done,
                report.skipped,
                report.released,
                report.failed
            );
        }
        Ok(report)
    }

    async fn process(&self, job: Job) -> Disposition {
        let id = job.id;
        let attempts = job.attempts;
        let checkpoint = job.metadata.clone();
        let Some(claim) = job.claim() else {
            log::error!("Job {} was handed out without a claim", id);
            return Disposition::Failed;
        };

        let progress: Box<dyn ProgressObserver> = match &self.events {
            Some(sender) => Box::new(BroadcastProgress::new(id, sender.clone())),
            None => Box::new(DiscardProgress),
        };

        let run = AssertUnwindSafe(self.pipeline.run(PipelineContext::new(job), progress.as_ref()))
            .catch_unwind()
            .await;

        let result = match run {
            Ok(outcome) => self.settle(&claim, attempts, outcome),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("Job {} panicked: {}", id, message);
                // Checkpoints written before the panic are already persisted.
                let metadata = match self.store.get(id) {
                    Ok(Some(job)) => job.metadata,
                    _ => checkpoint,
                };
                self.settle_failure(&claim, attempts, StageError::Panic(message), &metadata)
            }
        };

        result.unwrap_or_else(|e| {
            match e {
                StoreError::ClaimLost(_) => {
                    log::warn!("Outcome of job {} discarded: {}", id, e)
                }
                e => log::error!("Failed to record outcome of job {}: {}", id, e),
            }
            Disposition::Failed
        })
    }

    fn settle(
        &self,
        claim: &Claim,
        attempts: u32,
        outcome: PipelineOutcome,
    ) -> Result<Disposition, StoreError> {
        match outcome {
            PipelineOutcome::Completed { metadata } => {
                self.store.mark_done(claim, &metadata)?;
                Ok(Disposition::Done)
            }
            PipelineOutcome::Skipped { reason, metadata } => {
                self.store.checkpoint(claim, &metadata)?;
                self.store.mark_skipped(claim, &reason)?;
                Ok(Disposition::Skipped)
            }
            PipelineOutcome::Failed {
                error, metadata, ..
            } => self.settle_failure(claim, attempts, error, &metadata),
        }
    }

    fn settle_failure(
        &self,
        claim: &Claim,
        attempts: u32,
        error: StageError,
        metadata: &JobMetadata,
    ) -> Result<Disposition, StoreError> {
        let message = sanitize_error_message(&error.to_string());

        if error.class() == FailureClass::Transient && attempts < self.queue.max_attempts {
            let delay = self.queue.backoff_delay(attempts);
            self.store.release(claim, &message, metadata, delay)?;
            return Ok(Disposition::Released);
        }

        if error.class() == FailureClass::Transient {
            log::warn!(
                "Job {} exhausted {} attempt(s), giving up",
                claim.id,
                self.queue.max_attempts
            );
        }
        self.store.checkpoint(claim, metadata)?;
        self.store.mark_error(claim, &message)?;
        Ok(Disposition::Failed)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs [`Runner::tick`] periodically in a background thread.
pub struct Scheduler {
    runner: Arc<Runner>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(runner: Arc<Runner>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the loop in a background thread with its own current-thread
    /// runtime. The first tick runs immediately; sending on the trigger
    /// channel runs one early.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let runner = Arc::clone(&self.runner);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start scheduler runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let mut interval_timer = tokio::time::interval(interval);
                interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = interval_timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual queue run triggered");
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    if let Err(e) = runner.tick().await {
                        log::error!("Queue run failed: {}", e);
                    }
                }
                log::info!("Scheduler stopped");
            });
        })
    }

    /// Signals the loop to exit after the current tick. Send on the trigger
    /// channel afterwards to wake a sleeping loop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = BatchReport::default();
        for d in [
            Disposition::Done,
            Disposition::Done,
            Disposition::Released,
            Disposition::Failed,
            Disposition::Skipped,
        ] {
            report.record(d);
        }
        assert_eq!(report.done, 2);
        assert_eq!(report.released, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("bad input {}", 3)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "bad input 3");

        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
