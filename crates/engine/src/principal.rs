//! Run-as principal scoping.
//!
//! The engine executes each job under the principal recorded on its
//! descriptor. Real impersonation (sessions, credentials) is an external
//! collaborator; the engine only guarantees the scope is entered before any
//! job code runs and left on every exit path.

use cogwork_core::Principal;

/// An active impersonation context. Dropping it restores whatever context
/// was active before.
pub trait PrincipalScope {}

/// Produces impersonation scopes for descriptors' `run_as` principals.
pub trait PrincipalProvider: Send + Sync {
    fn enter(&self, principal: &Principal) -> Box<dyn PrincipalScope>;
}

/// Default provider: no real impersonation, just scope tracing.
#[derive(Debug, Default)]
pub struct SystemPrincipalProvider;

impl SystemPrincipalProvider {
    pub fn new() -> Self {
        Self
    }
}

struct TracedScope {
    principal: Principal,
}

impl PrincipalScope for TracedScope {}

impl Drop for TracedScope {
    fn drop(&mut self) {
        tracing::debug!(principal = %self.principal, "run-as scope released");
    }
}

impl PrincipalProvider for SystemPrincipalProvider {
    fn enter(&self, principal: &Principal) -> Box<dyn PrincipalScope> {
        tracing::debug!(principal = %principal, "run-as scope entered");
        Box::new(TracedScope {
            principal: principal.clone(),
        })
    }
}
