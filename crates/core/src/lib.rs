//! `cogwork-core` — domain foundation for the background job engine.
//!
//! This crate contains the **pure domain** vocabulary (no engine or storage
//! concerns): identifiers, queue kinds, the job contract, state snapshots,
//! message logs and signatures.

pub mod contract;
pub mod error;
pub mod id;
pub mod message;
pub mod queue;
pub mod signature;
pub mod state;

pub use contract::Job;
pub use error::{JobError, JobResult};
pub use id::{JobId, Principal};
pub use message::{JobMessage, Severity};
pub use queue::QueueKind;
pub use signature::JobSignature;
pub use state::JobSnapshot;
