//! Job store error types.

use thiserror::Error;

use super::job::{JobId, JobStatus};
use crate::db::DatabaseError;

/// Errors from [`super::store::JobStore`] operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Metadata serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The job is not in a state that permits the requested action.
    #[error("Cannot {action} job {id} while it is {status}")]
    InvalidTransition {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    /// The job was recovered and claimed again since this worker took it.
    #[error("Job {0} is no longer held by this worker")]
    ClaimLost(JobId),

    /// A stored row could not be decoded.
    #[error("Job {id} is corrupt: {reason}")]
    Corrupt { id: JobId, reason: String },
}
