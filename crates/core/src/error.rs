//! Job-level error model.

use thiserror::Error;

/// Result type returned by job contract methods.
pub type JobResult<T> = Result<T, JobError>;

/// Error raised by a job implementation.
///
/// Keep this focused on failures a single job run can produce; engine and
/// storage failures live in the engine crate.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job's work failed and cannot continue this run.
    #[error("job failed: {0}")]
    Failed(String),

    /// The job was asked to resume from a snapshot it cannot interpret.
    #[error("invalid job state: {0}")]
    InvalidState(String),

    /// Payload encoding/decoding failed.
    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JobError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
