//! Scoped promotion of low-level faults into job-level failures.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use cogwork_core::{JobId, JobResult};

/// A contained failure from inside a job's `process()` call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct JobFault {
    pub message: String,
}

impl JobFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Boundary that keeps a single job's faults inside that job's run.
///
/// Installed once per `run_job` and released on every exit path (Drop).
/// While armed, `contain` converts both returned errors and panics from the
/// wrapped call into a [`JobFault`] instead of letting them escape the
/// invocation.
#[derive(Debug)]
pub struct FaultTrap {
    job: JobId,
}

impl FaultTrap {
    pub fn install(job: JobId) -> Self {
        tracing::debug!(job = %job, "fault trap installed");
        Self { job }
    }

    /// Run one unit of job work inside the trap.
    pub fn contain<F>(&self, work: F) -> Result<(), JobFault>
    where
        F: FnOnce() -> JobResult<()>,
    {
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(JobFault::new(error.to_string())),
            Err(payload) => Err(JobFault::new(format!(
                "runtime fault: {}",
                panic_message(payload)
            ))),
        }
    }
}

impl Drop for FaultTrap {
    fn drop(&mut self) {
        tracing::debug!(job = %self.job, "fault trap released");
    }
}

/// Best-effort text for a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unidentified panic".to_string()
    }
}
