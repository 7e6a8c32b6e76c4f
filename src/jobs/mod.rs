//! In-process job management
//!
//! Each job runs one crawl session in the background. Callers poll live
//! progress, cancel jobs and collect results once a job is terminal.

mod manager;

pub use manager::{JobId, JobManager, JobResults, JobSnapshot, JobStats};

use crate::state::SessionStatus;
use thiserror::Error;

/// Errors returned by job operations
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {0} is already finished and cannot be cancelled")]
    AlreadyFinished(JobId),

    #[error("Job {id} is not finished yet (status: {status})")]
    NotFinished { id: JobId, status: SessionStatus },

    #[error("Job {id} failed: {error}")]
    Failed { id: JobId, error: String },

    #[error("Job task {0} panicked or was aborted")]
    TaskAborted(JobId),
}

/// Result type for job operations
pub type JobResult<T> = Result<T, JobError>;
