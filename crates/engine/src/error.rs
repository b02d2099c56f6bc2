//! Engine error model.

use thiserror::Error;

use crate::store::StoreError;

/// Failure surfaced by the engine itself, as opposed to a contained job
/// fault (those end up on the descriptor, not here).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A persisted descriptor references a job type the registry does not
    /// know. The descriptor is marked broken before this is returned.
    #[error("unknown job implementation: {0}")]
    UnknownImplementation(String),
}
