//! The job contract — the capability set every job type implements.

use crate::error::JobResult;
use crate::message::Severity;
use crate::queue::QueueKind;
use crate::signature::JobSignature;
use crate::state::JobSnapshot;

/// A unit of resumable background work.
///
/// The engine drives implementations through a strict protocol:
///
/// 1. `setup()` exactly once, before the first step is processed;
/// 2. `prepare_for_restart()` on every later resumption;
/// 3. `process()` repeatedly — each call performs one bounded unit of work
///    and must make observable progress toward `is_finished()`;
/// 4. `snapshot()` after every step, persisted by the engine so no progress
///    is lost if the host invocation dies;
/// 5. `restore()` when a persisted descriptor is picked up again.
///
/// `process()` must not block indefinitely: interruption (external pause,
/// memory pressure) is only observed between calls.
pub trait Job {
    /// Human-readable title, stored on the descriptor.
    fn title(&self) -> String;

    /// Registry id of this job type, stored on the descriptor so the engine
    /// can re-instantiate the job on resume.
    fn implementation(&self) -> &str;

    /// Deduplication fingerprint.
    ///
    /// The default derives it from the implementation id and the initial
    /// payload; override to widen or narrow what counts as "the same job".
    fn signature(&self) -> JobSignature {
        JobSignature::derive(self.implementation(), &self.snapshot().payload)
    }

    /// Queue this job belongs to. Fixed at enqueue time.
    fn queue(&self) -> QueueKind {
        QueueKind::Queued
    }

    /// One-time initialization, called only when no steps have been
    /// processed yet.
    fn setup(&mut self) -> JobResult<()> {
        Ok(())
    }

    /// Re-initialization on resumption after at least one processed step.
    fn prepare_for_restart(&mut self) -> JobResult<()> {
        Ok(())
    }

    /// Perform one bounded unit of work.
    fn process(&mut self) -> JobResult<()>;

    /// True once the job has nothing left to do.
    fn is_finished(&self) -> bool;

    /// Export the current state for persistence.
    fn snapshot(&self) -> JobSnapshot;

    /// Import previously persisted state.
    fn restore(&mut self, snapshot: JobSnapshot) -> JobResult<()>;

    /// Append a line to the job's message log.
    fn append_message(&mut self, severity: Severity, text: &str);
}
