// Domain port for the remote solve service
// Orchestration depends on this trait, never on a concrete transport

use std::time::Duration;

use super::models::{JobOptions, JobRequest, JobResponse};
use super::value_objects::ExecutionStatus;

/// Error types for talking to the solve service
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Job submission failed: {0}")]
    Submission(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Timed out after {0:?} waiting for job")]
    Timeout(Duration),

    #[error("Solve service error: {0}")]
    Remote(String),

    #[error("Invalid response from solve service: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Client interface for a job-based solve service.
///
/// Calls block the current thread. A job stays on the service until
/// `delete_job` is called unless it was submitted with
/// `delete_on_completion`.
pub trait JobClient: Send + Sync {
    /// Create a job, upload its inputs in order, and start it.
    /// Returns the job identifier.
    fn submit(&self, request: JobRequest<'_>) -> Result<String>;

    /// Block until the job stops running or `options.wait` elapses
    fn wait_for_completion(&self, job_id: &str, options: &JobOptions) -> Result<JobResponse>;

    /// Query the current execution status of a job
    fn execution_status(&self, job_id: &str) -> Result<ExecutionStatus>;

    /// Delete the job record; `Ok(false)` if the service had no such job
    fn delete_job(&self, job_id: &str) -> Result<bool>;

    /// Get the name of this client, for logging
    fn name(&self) -> &str;
}
