//! Exported job state — the snapshot that crosses the persistence boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{JobMessage, Severity};

/// Everything a job exports between `process()` calls.
///
/// The payload is an opaque, job-defined blob; it must round-trip exactly
/// across a pause/resume cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Total units of work, if the job can estimate them.
    pub total_steps: u64,
    /// Units of work completed so far. Never decreases within one run.
    pub steps_processed: u64,
    /// True once the job has nothing left to do.
    pub finished: bool,
    /// Job-defined serialized state.
    pub payload: Value,
    /// Messages the job appended during execution.
    pub messages: Vec<JobMessage>,
}

impl JobSnapshot {
    pub fn new(total_steps: u64, payload: Value) -> Self {
        Self {
            total_steps,
            steps_processed: 0,
            finished: false,
            payload,
            messages: Vec::new(),
        }
    }

    pub fn append_message(&mut self, severity: Severity, text: impl Into<String>) {
        self.messages.push(JobMessage::new(severity, text));
    }
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self::new(0, Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut snapshot = JobSnapshot::new(10, json!({"cursor": 42, "seen": ["a", "b"]}));
        snapshot.steps_processed = 4;
        snapshot.append_message(Severity::Info, "resuming from cursor 42");

        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: JobSnapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(snapshot, decoded);
    }
}
