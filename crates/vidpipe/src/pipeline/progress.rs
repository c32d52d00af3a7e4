//! Stage-level progress notifications.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::worker::job::{JobId, Stage};

/// Events emitted by the pipeline while a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageStarted { stage: Stage },
    StageCompleted { stage: Stage },
    /// The stage already completed on an earlier attempt.
    StageResumed { stage: Stage },
    Skipped { reason: String },
    Failed { stage: Stage, error: String },
    Completed,
}

/// Receives events for the job currently in the pipeline.
pub trait ProgressObserver: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

pub struct DiscardProgress;

impl ProgressObserver for DiscardProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// A progress event tagged with its job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub job_id: JobId,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

/// Forwards events of one job to a broadcast channel.
pub struct BroadcastProgress {
    job_id: JobId,
    sender: broadcast::Sender<JobProgress>,
}

impl BroadcastProgress {
    pub fn new(job_id: JobId, sender: broadcast::Sender<JobProgress>) -> Self {
        Self { job_id, sender }
    }
}

impl ProgressObserver for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(JobProgress {
            job_id: self.job_id,
            event,
        });
    }
}
