//! Shared test double: a job whose behavior each test scripts.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;

use cogwork_core::{Job, JobError, JobMessage, JobResult, JobSnapshot, QueueKind, Severity};
use cogwork_engine::{
    EngineConfig, InMemoryDescriptorStore, JobRegistry, JobRunner, ManualMemoryProbe,
};

pub const STEP_JOB: &str = "test.step";

/// Counters shared between a test and every job instance the registry
/// produces, so call patterns stay observable after the engine takes
/// ownership of the job.
#[derive(Clone, Default)]
pub struct StepProbes {
    pub process_calls: Arc<AtomicU64>,
    pub setup_calls: Arc<AtomicU64>,
    pub restart_calls: Arc<AtomicU64>,
}

impl StepProbes {
    pub fn processed(&self) -> u64 {
        self.process_calls.load(Ordering::SeqCst)
    }

    pub fn setups(&self) -> u64 {
        self.setup_calls.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> u64 {
        self.restart_calls.load(Ordering::SeqCst)
    }
}

/// Scripted behavior for [`StepJob`].
#[derive(Clone)]
pub struct StepBehavior {
    pub total: u64,
    /// When false the step counter never moves (a stalling job).
    pub advance: bool,
    /// Return an error from every `process()` call.
    pub fail: bool,
    /// Panic inside every `process()` call.
    pub panic: bool,
    pub queue: QueueKind,
    /// Folded into the payload so tests can force distinct signatures.
    pub tag: Option<String>,
}

impl Default for StepBehavior {
    fn default() -> Self {
        Self {
            total: 3,
            advance: true,
            fail: false,
            panic: false,
            queue: QueueKind::Queued,
            tag: None,
        }
    }
}

pub struct StepJob {
    behavior: StepBehavior,
    current: u64,
    messages: Vec<JobMessage>,
    probes: StepProbes,
}

impl StepJob {
    pub fn new(behavior: StepBehavior, probes: StepProbes) -> Self {
        Self {
            behavior,
            current: 0,
            messages: Vec::new(),
            probes,
        }
    }
}

impl Job for StepJob {
    fn title(&self) -> String {
        "step job".to_string()
    }

    fn implementation(&self) -> &str {
        STEP_JOB
    }

    fn queue(&self) -> QueueKind {
        self.behavior.queue.clone()
    }

    fn setup(&mut self) -> JobResult<()> {
        self.probes.setup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn prepare_for_restart(&mut self) -> JobResult<()> {
        self.probes.restart_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn process(&mut self) -> JobResult<()> {
        self.probes.process_calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior.panic {
            panic!("simulated runtime fault");
        }
        if self.behavior.fail {
            return Err(JobError::failed("simulated processing failure"));
        }
        if self.behavior.advance {
            self.current += 1;
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.behavior.advance && self.current >= self.behavior.total
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            total_steps: self.behavior.total,
            steps_processed: self.current,
            finished: self.is_finished(),
            payload: json!({ "current": self.current, "tag": self.behavior.tag }),
            messages: self.messages.clone(),
        }
    }

    fn restore(&mut self, snapshot: JobSnapshot) -> JobResult<()> {
        if let Some(current) = snapshot.payload.get("current").and_then(|v| v.as_u64()) {
            self.current = current;
        }
        self.messages = snapshot.messages;
        Ok(())
    }

    fn append_message(&mut self, severity: Severity, text: &str) {
        self.messages.push(JobMessage::new(severity, text));
    }
}

/// Registry producing [`StepJob`]s with the given behavior.
pub fn registry_with_step_job(behavior: StepBehavior) -> (Arc<JobRegistry>, StepProbes) {
    let probes = StepProbes::default();
    let factory_probes = probes.clone();
    let mut registry = JobRegistry::new();
    registry.register(STEP_JOB, move || {
        Box::new(StepJob::new(behavior.clone(), factory_probes.clone())) as Box<dyn Job>
    });
    (Arc::new(registry), probes)
}

/// A runner over an in-memory store with a manual memory probe (reading 0
/// unless a test raises it).
pub fn runner_with(
    store: Arc<InMemoryDescriptorStore>,
    behavior: StepBehavior,
    config: EngineConfig,
) -> (JobRunner, StepProbes, Arc<ManualMemoryProbe>) {
    let (registry, probes) = registry_with_step_job(behavior);
    let memory = Arc::new(ManualMemoryProbe::new(0));
    let runner = JobRunner::new(store, registry, config).with_memory_probe(memory.clone());
    (runner, probes, memory)
}
