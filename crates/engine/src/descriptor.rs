//! The persisted record of one job instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cogwork_core::{JobId, JobMessage, JobSignature, JobSnapshot, Principal, QueueKind, Severity};

/// Lifecycle state of a descriptor.
///
/// `New → Init → Run → {Complete | Broken | Wait}`. Wait re-enters Init on a
/// later invocation; Broken comes back only through the health monitor's
/// bounded recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    New,
    Init,
    Run,
    Wait,
    Broken,
    Complete,
}

impl JobStatus {
    /// True for states the scheduler will never pick up again on its own.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Broken)
    }

    /// True while a descriptor holds its queue's exclusivity slot.
    #[inline]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Init | Self::Run)
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::Init => "init",
            Self::Run => "run",
            Self::Wait => "wait",
            Self::Broken => "broken",
            Self::Complete => "complete",
        })
    }
}

/// One persisted job instance.
///
/// Mutated only by the runner and the health monitor; never deleted by the
/// engine (retention is an external concern).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub title: String,
    /// Registry id used to re-instantiate the job type on resume.
    pub implementation: String,
    /// Deduplication fingerprint of job type + initial payload.
    pub signature: JobSignature,
    pub queue_kind: QueueKind,
    pub status: JobStatus,
    /// Not eligible for selection before this time.
    pub start_after: Option<DateTime<Utc>>,
    pub total_steps: u64,
    pub steps_processed: u64,
    /// Progress baseline recorded by the health monitor; equality with
    /// `steps_processed` across a check window means the job stalled.
    pub last_processed_count: Option<u64>,
    /// Automatic stall recoveries attempted so far.
    pub resume_count: u32,
    pub run_as: Principal,
    pub job_started: Option<DateTime<Utc>>,
    pub job_restarted: Option<DateTime<Utc>>,
    pub job_finished: Option<DateTime<Utc>>,
    /// Opaque job-defined state blob.
    pub payload: serde_json::Value,
    pub messages: Vec<JobMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub fn new(
        title: impl Into<String>,
        implementation: impl Into<String>,
        signature: JobSignature,
        queue_kind: QueueKind,
        start_after: Option<DateTime<Utc>>,
        run_as: Principal,
        initial: JobSnapshot,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            title: title.into(),
            implementation: implementation.into(),
            signature,
            queue_kind,
            status: JobStatus::New,
            start_after,
            total_steps: initial.total_steps,
            steps_processed: initial.steps_processed,
            last_processed_count: None,
            resume_count: 0,
            run_as,
            job_started: None,
            job_restarted: None,
            job_finished: None,
            payload: initial.payload,
            messages: initial.messages,
            created_at: now,
            updated_at: now,
        }
    }

    /// Export state for handing to a job instance on resume.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            total_steps: self.total_steps,
            steps_processed: self.steps_processed,
            finished: self.status == JobStatus::Complete,
            payload: self.payload.clone(),
            messages: self.messages.clone(),
        }
    }

    /// Import the state a job exported after a `process()` call.
    ///
    /// The step counter may only stay the same or grow within one run; a
    /// snapshot reporting fewer processed steps keeps the prior count.
    pub fn absorb(&mut self, snapshot: JobSnapshot) {
        self.total_steps = snapshot.total_steps;
        self.steps_processed = self.steps_processed.max(snapshot.steps_processed);
        self.payload = snapshot.payload;
        self.messages = snapshot.messages;
        self.touch();
    }

    pub fn append_message(&mut self, severity: Severity, text: impl Into<String>) {
        self.messages.push(JobMessage::new(severity, text));
        self.touch();
    }

    pub fn mark_running(&mut self) {
        let now = Utc::now();
        if self.job_started.is_none() {
            self.job_started = Some(now);
        } else {
            self.job_restarted = Some(now);
        }
        self.status = JobStatus::Run;
        self.updated_at = now;
    }

    pub fn mark_wait(&mut self) {
        self.status = JobStatus::Wait;
        self.touch();
    }

    pub fn mark_broken(&mut self) {
        self.status = JobStatus::Broken;
        self.touch();
    }

    pub fn mark_complete(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Complete;
        self.job_finished = Some(now);
        self.updated_at = now;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
