//! Teardown drain for the immediate queue.

use cogwork_core::QueueKind;

use crate::error::EngineError;
use crate::runner::{JobRunner, RunOutcome, Selection};

/// Run every selectable immediate-queue job before the process exits.
///
/// Jobs enqueued onto the immediate queue mid-invocation would otherwise
/// sit until the next external trigger. Returns how many jobs were run.
///
/// A job the memory watchdog parks stays parked: draining it again in the
/// same pressured process would loop without making room.
pub fn drain_immediate(runner: &JobRunner) -> Result<usize, EngineError> {
    let mut ran = 0usize;

    loop {
        let descriptor = match runner.select_next(&QueueKind::Immediate)? {
            Selection::Resume(descriptor) | Selection::Start(descriptor) => descriptor,
            Selection::Busy | Selection::Idle => break,
        };

        let outcome = runner.run_job(descriptor.id)?;
        ran += 1;
        tracing::info!(job = %descriptor.id, outcome = %outcome, "drained immediate job");

        if matches!(outcome, RunOutcome::Suspended | RunOutcome::Lost) {
            break;
        }
    }

    if ran > 0 {
        tracing::info!(jobs = ran, "immediate queue drained");
    }
    Ok(ran)
}
