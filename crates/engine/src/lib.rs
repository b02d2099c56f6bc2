//! `cogwork-engine` — the job-processing engine.
//!
//! Orchestrates the persisted job lifecycle: descriptor creation and
//! deduplication, per-queue scheduling, the run loop with its fault trap and
//! watchdogs, stall recovery, and the teardown drain. One job runs at a time
//! per invocation; concurrency comes from running multiple invocations
//! against a shared descriptor store.

pub mod config;
pub mod descriptor;
pub mod drain;
pub mod error;
pub mod fault;
pub mod health;
pub mod memory;
pub mod notify;
pub mod principal;
pub mod registry;
pub mod runner;
pub mod store;

pub use config::EngineConfig;
pub use descriptor::{JobDescriptor, JobStatus};
pub use drain::drain_immediate;
pub use error::EngineError;
pub use fault::{FaultTrap, JobFault};
pub use health::{HealthMonitor, HealthReport};
pub use memory::{ManualMemoryProbe, MemoryProbe, SystemMemoryProbe};
pub use notify::{LogNotifier, Notice, Notifier, NotifyError};
pub use principal::{PrincipalProvider, PrincipalScope, SystemPrincipalProvider};
pub use registry::JobRegistry;
pub use runner::{JobRunner, QueueCount, RunOutcome, Selection};
pub use store::{DescriptorStore, InMemoryDescriptorStore, StoreError};
