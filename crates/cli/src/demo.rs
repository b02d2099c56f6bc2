//! A small counting job for exercising the engine end to end.

use serde::{Deserialize, Serialize};
use serde_json::json;

use cogwork_core::{Job, JobMessage, JobResult, JobSnapshot, QueueKind, Severity};

pub const IMPLEMENTATION: &str = "demo.counter";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CounterState {
    total: u64,
    current: u64,
}

/// Counts to a configured total, one step per `process()` call.
#[derive(Debug, Default)]
pub struct CounterJob {
    total: u64,
    current: u64,
    messages: Vec<JobMessage>,
}

impl CounterJob {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            current: 0,
            messages: Vec::new(),
        }
    }
}

impl Job for CounterJob {
    fn title(&self) -> String {
        format!("Count to {}", self.total)
    }

    fn implementation(&self) -> &str {
        IMPLEMENTATION
    }

    fn queue(&self) -> QueueKind {
        QueueKind::Queued
    }

    fn process(&mut self) -> JobResult<()> {
        self.current += 1;
        if self.is_finished() {
            self.append_message(Severity::Info, "finished counting");
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.current >= self.total
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            total_steps: self.total,
            steps_processed: self.current,
            finished: self.is_finished(),
            payload: json!({ "total": self.total, "current": self.current }),
            messages: self.messages.clone(),
        }
    }

    fn restore(&mut self, snapshot: JobSnapshot) -> JobResult<()> {
        if !snapshot.payload.is_null() {
            let state: CounterState = serde_json::from_value(snapshot.payload)?;
            self.total = state.total;
            self.current = state.current;
        }
        self.messages = snapshot.messages;
        Ok(())
    }

    fn append_message(&mut self, severity: Severity, text: &str) {
        self.messages.push(JobMessage::new(severity, text));
    }
}
