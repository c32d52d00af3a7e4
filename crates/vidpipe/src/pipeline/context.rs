use crate::worker::error::StoreError;
use crate::worker::job::{Claim, Job, JobMetadata};

pub struct PipelineContext {
    // Input
    pub job: Job,

    // Working copy of the job's metadata; checkpoints accumulate here
    pub metadata: JobMetadata,

    // Transcript text, fetched this run or loaded from the store
    pub transcript: Option<String>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        let metadata = job.metadata.clone();
        Self {
            job,
            metadata,
            transcript: None,
        }
    }

    /// Claim the job is processed under. Writes without one are refused.
    pub fn claim(&self) -> Result<Claim, StoreError> {
        self.job.claim().ok_or(StoreError::ClaimLost(self.job.id))
    }

    pub fn title(&self) -> &str {
        self.metadata
            .video
            .as_ref()
            .map(|v| v.title.as_str())
            .unwrap_or("")
    }
}
