//! Trigger entry point: one scheduler invocation per run.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use cogwork_core::{Job, Principal, QueueKind};
use cogwork_engine::{
    drain_immediate, EngineConfig, HealthMonitor, InMemoryDescriptorStore, JobRegistry, JobRunner,
    LogNotifier, Selection,
};

mod demo;

/// Cron-triggered worker for the cogwork job engine.
///
/// Each run health-checks active jobs, executes at most one job from the
/// selected queue, and drains the immediate queue before exiting.
#[derive(Debug, Parser)]
#[command(name = "cogwork", version, about)]
struct Args {
    /// Queue to service: a name (immediate, queued, large, or a custom
    /// queue) or its number (1, 2, 3). Defaults to the queued queue.
    queue: Option<String>,

    /// Print open job counts per queue instead of running anything.
    #[arg(long)]
    list: bool,

    /// Principal jobs run under when their descriptor names none.
    #[arg(long, value_name = "PRINCIPAL")]
    run_as: Option<String>,

    /// Enqueue a demo counter job with this many steps before processing.
    #[arg(long, value_name = "STEPS")]
    demo: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    cogwork_observability::init();
    let args = Args::parse();

    let mut config = EngineConfig::from_env();
    if let Some(run_as) = &args.run_as {
        config.default_run_as = Principal::new(run_as);
    }

    let kind = QueueKind::from_selector(args.queue.as_deref().unwrap_or(""));

    let store = Arc::new(InMemoryDescriptorStore::new());
    let mut registry = JobRegistry::new();
    registry.register(demo::IMPLEMENTATION, || {
        Box::new(demo::CounterJob::default()) as Box<dyn Job>
    });
    registry
        .validate(&[demo::IMPLEMENTATION])
        .context("job registry is incomplete")?;

    let runner = JobRunner::new(store.clone(), Arc::new(registry), config.clone());
    let monitor = HealthMonitor::new(store, Arc::new(LogNotifier::new()), &config);

    progress(format!("servicing queue '{}'", kind));

    let report = monitor.check().context("health check failed")?;
    if !report.resumed.is_empty() || !report.broken.is_empty() {
        progress(format!(
            "health check: {} job(s) scheduled for restart, {} broken",
            report.resumed.len(),
            report.broken.len()
        ));
    }

    if args.list {
        let kinds = [QueueKind::Immediate, QueueKind::Queued, QueueKind::Large];
        for count in runner.list_counts(&kinds)? {
            progress(format!("queue '{}': {} open job(s)", count.kind, count.open));
        }
        return Ok(());
    }

    if let Some(steps) = args.demo {
        let job = demo::CounterJob::new(steps);
        let id = runner.enqueue(&job, None, None)?;
        progress(format!("enqueued demo job {} ({} steps)", id, steps));
    }

    match runner.select_next(&kind)? {
        Selection::Resume(descriptor) => {
            progress(format!("resuming job {} ({})", descriptor.id, descriptor.title));
            let outcome = runner.run_job(descriptor.id)?;
            progress(format!("job {} {}", descriptor.id, outcome));
        }
        Selection::Start(descriptor) => {
            progress(format!("starting job {} ({})", descriptor.id, descriptor.title));
            let outcome = runner.run_job(descriptor.id)?;
            progress(format!("job {} {}", descriptor.id, outcome));
        }
        Selection::Busy => progress("job already running; nothing started"),
        Selection::Idle => progress("no new jobs"),
    }

    let drained = drain_immediate(&runner)?;
    if drained > 0 {
        progress(format!("drained {} immediate job(s)", drained));
    }

    Ok(())
}

fn progress(message: impl AsRef<str>) {
    println!(
        "[{}] {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        message.as_ref()
    );
}
