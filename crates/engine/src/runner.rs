//! The job runner: descriptor lifecycle, scheduling, and the run loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use cogwork_core::{Job, JobId, Principal, QueueKind, Severity};

use crate::config::EngineConfig;
use crate::descriptor::{JobDescriptor, JobStatus};
use crate::error::EngineError;
use crate::fault::{self, FaultTrap};
use crate::memory::{MemoryProbe, SystemMemoryProbe};
use crate::principal::{PrincipalProvider, SystemPrincipalProvider};
use crate::registry::JobRegistry;
use crate::store::{DescriptorStore, StoreError};

/// What `select_next` found for a queue.
///
/// Deliberately not a boolean: "a job is already running" (`Busy`) and "no
/// candidate qualifies" (`Idle`) demand different caller behavior, and
/// collapsing them is how queues end up double-started.
#[derive(Debug)]
pub enum Selection {
    /// A suspended job to resume. Resumption preempts new work.
    Resume(JobDescriptor),
    /// The queue's exclusivity slot is taken; do not start anything.
    Busy,
    /// The earliest eligible new job.
    Start(JobDescriptor),
    /// Nothing to do for this queue.
    Idle,
}

/// How one `run_job` invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job finished its work; descriptor is Complete.
    Completed,
    /// The memory watchdog parked the job; descriptor is Wait.
    Suspended,
    /// An external actor moved the descriptor out of Run; not a failure.
    Paused,
    /// A fault or stall ended the run; descriptor is Broken.
    Broken,
    /// Another invocation claimed the descriptor first.
    Lost,
}

impl core::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::Suspended => "suspended",
            Self::Paused => "paused",
            Self::Broken => "broken",
            Self::Lost => "lost",
        })
    }
}

/// Non-terminal descriptor count for one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCount {
    pub kind: QueueKind,
    pub open: usize,
}

/// Orchestrates descriptor lifecycle: creation, selection, execution.
pub struct JobRunner {
    store: Arc<dyn DescriptorStore>,
    registry: Arc<JobRegistry>,
    principals: Arc<dyn PrincipalProvider>,
    memory: Arc<dyn MemoryProbe>,
    config: EngineConfig,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn DescriptorStore>,
        registry: Arc<JobRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            registry,
            principals: Arc::new(SystemPrincipalProvider::new()),
            memory: Arc::new(SystemMemoryProbe::new()),
            config,
        }
    }

    /// Replace the run-as collaborator (real impersonation).
    pub fn with_principals(mut self, principals: Arc<dyn PrincipalProvider>) -> Self {
        self.principals = principals;
        self
    }

    /// Replace the memory probe (tests, platform-specific sampling).
    pub fn with_memory_probe(mut self, memory: Arc<dyn MemoryProbe>) -> Self {
        self.memory = memory;
        self
    }

    pub fn store(&self) -> &Arc<dyn DescriptorStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Queue a job for background execution.
    ///
    /// Enqueue is deduplicating: while a `New` descriptor with the same
    /// signature exists, re-enqueueing returns its id and creates nothing.
    pub fn enqueue(
        &self,
        job: &dyn Job,
        start_after: Option<DateTime<Utc>>,
        run_as: Option<Principal>,
    ) -> Result<JobId, EngineError> {
        let signature = job.signature();
        if let Some(existing) = self.store.find_new_by_signature(&signature)? {
            tracing::debug!(
                job = %existing.id,
                signature = %signature,
                "enqueue deduplicated onto pending descriptor"
            );
            return Ok(existing.id);
        }

        let descriptor = JobDescriptor::new(
            job.title(),
            job.implementation(),
            signature,
            job.queue(),
            start_after,
            run_as.unwrap_or_else(|| self.config.default_run_as.clone()),
            job.snapshot(),
        );
        let id = self.store.create(descriptor)?;
        tracing::info!(job = %id, implementation = %job.implementation(), "job enqueued");
        Ok(id)
    }

    /// Pick what this invocation should do for `kind`.
    ///
    /// Suspended jobs preempt new ones; an active descriptor makes the whole
    /// queue Busy; otherwise the earliest eligible `New` descriptor wins.
    pub fn select_next(&self, kind: &QueueKind) -> Result<Selection, EngineError> {
        if let Some(descriptor) = self.store.find_waiting_by_kind(kind)?.into_iter().next() {
            return Ok(Selection::Resume(descriptor));
        }

        if !self.store.find_active_by_kind(kind)?.is_empty() {
            return Ok(Selection::Busy);
        }

        match self
            .store
            .find_eligible_new(kind, Utc::now())?
            .into_iter()
            .next()
        {
            Some(descriptor) => Ok(Selection::Start(descriptor)),
            None => Ok(Selection::Idle),
        }
    }

    /// Non-terminal descriptor counts for the given queues.
    pub fn list_counts(&self, kinds: &[QueueKind]) -> Result<Vec<QueueCount>, EngineError> {
        kinds
            .iter()
            .map(|kind| {
                Ok(QueueCount {
                    kind: kind.clone(),
                    open: self.store.count_open_by_kind(kind)?,
                })
            })
            .collect()
    }

    /// Execute one descriptor to completion or interruption.
    ///
    /// Every fault originating inside the job is contained here: the
    /// descriptor ends up Broken and the invocation carries on. Only store
    /// failures and a missing/unknown descriptor surface as errors.
    pub fn run_job(&self, id: JobId) -> Result<RunOutcome, EngineError> {
        let loaded = match self.store.find_by_id(id) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                tracing::error!(job = %id, error = %error, "cannot run job: descriptor missing");
                return Err(error.into());
            }
        };

        let Some(mut job) = self.registry.instantiate(&loaded.implementation) else {
            let implementation = loaded.implementation.clone();
            let mut descriptor = loaded;
            descriptor.append_message(
                Severity::Error,
                format!("job implementation '{}' is not registered", implementation),
            );
            descriptor.mark_broken();
            self.store.update(&descriptor)?;
            tracing::error!(job = %id, implementation = %implementation, "job implementation not registered");
            return Err(EngineError::UnknownImplementation(implementation));
        };

        // Both guards hold for the entire run and unwind on every exit path.
        let _scope = self.principals.enter(&loaded.run_as);
        let trap = FaultTrap::install(id);

        // Atomically take the queue's exclusivity slot. Losing the race is a
        // normal outcome, not an error.
        let mut descriptor = match self.store.claim(
            id,
            &[JobStatus::New, JobStatus::Wait],
            JobStatus::Init,
        ) {
            Ok(descriptor) => descriptor,
            Err(StoreError::Conflict { found, .. }) => {
                tracing::info!(job = %id, status = %found, "descriptor already claimed by another invocation");
                return Ok(RunOutcome::Lost);
            }
            Err(e) => return Err(e.into()),
        };

        let driven = panic::catch_unwind(AssertUnwindSafe(|| {
            self.drive(&mut descriptor, job.as_mut(), &trap)
        }));

        match driven {
            Ok(result) => result,
            Err(payload) => {
                // A fault outside process() (setup, snapshots, is_finished).
                // Contain it at this boundary instead of crashing the host.
                let text = fault::panic_message(payload);
                descriptor.append_message(
                    Severity::Error,
                    format!("unexpected runtime fault: {}", text),
                );
                descriptor.mark_broken();
                self.store.update(&descriptor)?;
                tracing::error!(job = %id, fault = %text, "job run aborted by unexpected fault");
                Ok(RunOutcome::Broken)
            }
        }
    }

    /// Initialize the job from its descriptor and run the loop.
    fn drive(
        &self,
        descriptor: &mut JobDescriptor,
        job: &mut dyn Job,
        trap: &FaultTrap,
    ) -> Result<RunOutcome, EngineError> {
        if let Err(error) = job.restore(descriptor.snapshot()) {
            return self.break_job(descriptor, format!("state import failed: {}", error));
        }

        let initialized = if descriptor.steps_processed == 0 {
            job.setup()
        } else {
            job.prepare_for_restart()
        };
        if let Err(error) = initialized {
            return self.break_job(descriptor, format!("initialization failed: {}", error));
        }

        descriptor.absorb(job.snapshot());
        descriptor.mark_running();
        self.store.update(descriptor)?;
        tracing::info!(
            job = %descriptor.id,
            title = %descriptor.title,
            queue = %descriptor.queue_kind,
            resumed = descriptor.job_restarted.is_some(),
            "job running"
        );

        let mut idle_iterations = 0u32;

        while !job.is_finished() {
            // An operator or another invocation may have moved the status;
            // that is a pause, not a failure.
            let observed = self.store.find_by_id(descriptor.id)?;
            if observed.status != JobStatus::Run {
                descriptor.status = observed.status;
                descriptor.append_message(
                    Severity::Info,
                    format!("job paused externally (status is now {})", observed.status),
                );
                self.store.update(descriptor)?;
                tracing::info!(job = %descriptor.id, status = %observed.status, "job paused externally");
                return Ok(RunOutcome::Paused);
            }

            let steps_before = descriptor.steps_processed;
            if let Err(job_fault) = trap.contain(|| job.process()) {
                descriptor.absorb(job.snapshot());
                descriptor.append_message(Severity::Error, job_fault.message.clone());
                descriptor.mark_broken();
                self.store.update(descriptor)?;
                tracing::error!(job = %descriptor.id, fault = %job_fault, "job processing fault");
                return Ok(RunOutcome::Broken);
            }
            descriptor.absorb(job.snapshot());

            if descriptor.steps_processed == steps_before {
                idle_iterations += 1;
                if idle_iterations > self.config.stall_threshold {
                    return self.break_job(
                        descriptor,
                        format!(
                            "job stalled: {} consecutive iterations without progress",
                            idle_iterations
                        ),
                    );
                }
            } else {
                idle_iterations = 0;
            }

            let used = self.memory.used_bytes();
            if used > self.config.memory_ceiling_bytes {
                descriptor.append_message(
                    Severity::Info,
                    format!(
                        "releasing memory: {} bytes used, ceiling is {}",
                        used, self.config.memory_ceiling_bytes
                    ),
                );
                descriptor.mark_wait();
                self.store.update(descriptor)?;
                tracing::info!(job = %descriptor.id, used_bytes = used, "job suspended by memory watchdog");
                return Ok(RunOutcome::Suspended);
            }

            // Persist progress every iteration so a crash of the host
            // invocation loses at most one step.
            self.store.update(descriptor)?;
        }

        descriptor.absorb(job.snapshot());
        descriptor.mark_complete();
        self.store.update(descriptor)?;
        tracing::info!(
            job = %descriptor.id,
            steps = descriptor.steps_processed,
            "job complete"
        );
        Ok(RunOutcome::Completed)
    }

    fn break_job(
        &self,
        descriptor: &mut JobDescriptor,
        message: String,
    ) -> Result<RunOutcome, EngineError> {
        tracing::warn!(job = %descriptor.id, reason = %message, "job broken");
        descriptor.append_message(Severity::Error, message);
        descriptor.mark_broken();
        self.store.update(descriptor)?;
        Ok(RunOutcome::Broken)
    }
}
