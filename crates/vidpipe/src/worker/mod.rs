pub mod error;
pub mod job;
pub mod scheduler;
pub mod store;

pub use error::StoreError;
pub use job::{
    Claim, EnqueueRequest, Enqueued, Job, JobId, JobMetadata, JobStatus, QueueStats, Stage,
    DEFAULT_PRIORITY,
};
pub use scheduler::{BatchReport, Disposition, Runner, Scheduler};
pub use store::{JobFilter, JobStore};
