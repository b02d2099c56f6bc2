//! Descriptor storage abstraction.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use cogwork_core::{JobId, JobSignature, QueueKind};

use crate::descriptor::{JobDescriptor, JobStatus};

/// Persistence seam for job descriptors.
///
/// Any backing store (relational, document, key-value with secondary
/// indexes) satisfying these query shapes is acceptable. `update` must be
/// safe to call on every iteration of the run loop.
pub trait DescriptorStore: Send + Sync {
    /// Persist a freshly created descriptor.
    fn create(&self, descriptor: JobDescriptor) -> Result<JobId, StoreError>;

    /// Load one descriptor; `NotFound` if absent.
    fn find_by_id(&self, id: JobId) -> Result<JobDescriptor, StoreError>;

    /// The pending (`New`) descriptor with this signature, if any — the
    /// lookup behind deduplicating enqueue.
    fn find_new_by_signature(
        &self,
        signature: &JobSignature,
    ) -> Result<Option<JobDescriptor>, StoreError>;

    /// Descriptors holding a queue's exclusivity slot (`Init` or `Run`).
    fn find_active_by_kind(&self, kind: &QueueKind) -> Result<Vec<JobDescriptor>, StoreError>;

    /// Suspended (`Wait`) descriptors for a queue.
    fn find_waiting_by_kind(&self, kind: &QueueKind) -> Result<Vec<JobDescriptor>, StoreError>;

    /// `New` descriptors for a queue whose `start_after` is unset or due,
    /// ordered by ascending id (first-in-first-out tie-break).
    fn find_eligible_new(
        &self,
        kind: &QueueKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobDescriptor>, StoreError>;

    /// All descriptors currently in `status`.
    fn find_by_status(&self, status: JobStatus) -> Result<Vec<JobDescriptor>, StoreError>;

    /// Persist the full descriptor state.
    fn update(&self, descriptor: &JobDescriptor) -> Result<(), StoreError>;

    /// Atomic conditional status transition.
    ///
    /// Moves the descriptor into `to` only if its current status is one of
    /// `from`, and returns the post-transition record. Two invocations
    /// racing for the same descriptor see exactly one winner; the loser gets
    /// `Conflict`.
    fn claim(
        &self,
        id: JobId,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<JobDescriptor, StoreError>;

    /// Count of non-terminal descriptors in a queue.
    fn count_open_by_kind(&self, kind: &QueueKind) -> Result<usize, StoreError>;
}

/// Descriptor store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("descriptor not found: {0}")]
    NotFound(JobId),
    #[error("descriptor {id} is {found}, expected one of {expected:?}")]
    Conflict {
        id: JobId,
        found: JobStatus,
        expected: Vec<JobStatus>,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory descriptor store for tests/dev.
///
/// A durable implementation only has to reproduce the trait's query shapes;
/// this one is the reference for their semantics.
#[derive(Debug, Default)]
pub struct InMemoryDescriptorStore {
    descriptors: RwLock<HashMap<JobId, JobDescriptor>>,
}

impl InMemoryDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_by_id(mut found: Vec<JobDescriptor>) -> Vec<JobDescriptor> {
        found.sort_by_key(|d| d.id);
        found
    }
}

impl DescriptorStore for InMemoryDescriptorStore {
    fn create(&self, descriptor: JobDescriptor) -> Result<JobId, StoreError> {
        let mut descriptors = self.descriptors.write().unwrap();
        let id = descriptor.id;
        descriptors.insert(id, descriptor);
        Ok(id)
    }

    fn find_by_id(&self, id: JobId) -> Result<JobDescriptor, StoreError> {
        let descriptors = self.descriptors.read().unwrap();
        descriptors.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn find_new_by_signature(
        &self,
        signature: &JobSignature,
    ) -> Result<Option<JobDescriptor>, StoreError> {
        let descriptors = self.descriptors.read().unwrap();
        Ok(descriptors
            .values()
            .find(|d| d.status == JobStatus::New && &d.signature == signature)
            .cloned())
    }

    fn find_active_by_kind(&self, kind: &QueueKind) -> Result<Vec<JobDescriptor>, StoreError> {
        let descriptors = self.descriptors.read().unwrap();
        Ok(Self::sorted_by_id(
            descriptors
                .values()
                .filter(|d| d.status.is_active() && &d.queue_kind == kind)
                .cloned()
                .collect(),
        ))
    }

    fn find_waiting_by_kind(&self, kind: &QueueKind) -> Result<Vec<JobDescriptor>, StoreError> {
        let descriptors = self.descriptors.read().unwrap();
        Ok(Self::sorted_by_id(
            descriptors
                .values()
                .filter(|d| d.status == JobStatus::Wait && &d.queue_kind == kind)
                .cloned()
                .collect(),
        ))
    }

    fn find_eligible_new(
        &self,
        kind: &QueueKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobDescriptor>, StoreError> {
        let descriptors = self.descriptors.read().unwrap();
        Ok(Self::sorted_by_id(
            descriptors
                .values()
                .filter(|d| {
                    d.status == JobStatus::New
                        && &d.queue_kind == kind
                        && d.start_after.map_or(true, |t| t <= now)
                })
                .cloned()
                .collect(),
        ))
    }

    fn find_by_status(&self, status: JobStatus) -> Result<Vec<JobDescriptor>, StoreError> {
        let descriptors = self.descriptors.read().unwrap();
        Ok(Self::sorted_by_id(
            descriptors
                .values()
                .filter(|d| d.status == status)
                .cloned()
                .collect(),
        ))
    }

    fn update(&self, descriptor: &JobDescriptor) -> Result<(), StoreError> {
        let mut descriptors = self.descriptors.write().unwrap();
        if !descriptors.contains_key(&descriptor.id) {
            return Err(StoreError::NotFound(descriptor.id));
        }
        descriptors.insert(descriptor.id, descriptor.clone());
        Ok(())
    }

    fn claim(
        &self,
        id: JobId,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<JobDescriptor, StoreError> {
        // Single write lock for the whole check-then-set, so two invocations
        // racing from New to Init see exactly one winner.
        let mut descriptors = self.descriptors.write().unwrap();
        let descriptor = descriptors.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !from.contains(&descriptor.status) {
            return Err(StoreError::Conflict {
                id,
                found: descriptor.status,
                expected: from.to_vec(),
            });
        }

        descriptor.status = to;
        descriptor.updated_at = Utc::now();
        Ok(descriptor.clone())
    }

    fn count_open_by_kind(&self, kind: &QueueKind) -> Result<usize, StoreError> {
        let descriptors = self.descriptors.read().unwrap();
        Ok(descriptors
            .values()
            .filter(|d| &d.queue_kind == kind && !d.status.is_terminal())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogwork_core::{JobSnapshot, Principal};
    use proptest::prelude::*;
    use serde_json::json;

    fn descriptor(kind: QueueKind, signature: &str) -> JobDescriptor {
        JobDescriptor::new(
            "test job",
            "test.job",
            JobSignature::raw(signature),
            kind,
            None,
            Principal::system(),
            JobSnapshot::new(1, json!({})),
        )
    }

    #[test]
    fn find_by_id_reports_missing_descriptors() {
        let store = InMemoryDescriptorStore::new();
        let id = JobId::new();
        assert!(matches!(store.find_by_id(id), Err(StoreError::NotFound(missing)) if missing == id));
    }

    #[test]
    fn new_signature_lookup_ignores_non_new_descriptors() {
        let store = InMemoryDescriptorStore::new();
        let mut d = descriptor(QueueKind::Queued, "sig-a");
        d.status = JobStatus::Complete;
        store.create(d).unwrap();

        assert!(store
            .find_new_by_signature(&JobSignature::raw("sig-a"))
            .unwrap()
            .is_none());

        let pending = descriptor(QueueKind::Queued, "sig-a");
        let pending_id = pending.id;
        store.create(pending).unwrap();
        let found = store
            .find_new_by_signature(&JobSignature::raw("sig-a"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, pending_id);
    }

    #[test]
    fn eligibility_respects_start_after() {
        let store = InMemoryDescriptorStore::new();
        let now = Utc::now();

        let due = descriptor(QueueKind::Queued, "due");
        let due_id = due.id;
        store.create(due).unwrap();

        let mut later = descriptor(QueueKind::Queued, "later");
        later.start_after = Some(now + chrono::Duration::hours(1));
        store.create(later).unwrap();

        let eligible = store.find_eligible_new(&QueueKind::Queued, now).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, due_id);
    }

    #[test]
    fn claim_is_first_winner_takes_all() {
        let store = InMemoryDescriptorStore::new();
        let d = descriptor(QueueKind::Queued, "sig");
        let id = d.id;
        store.create(d).unwrap();

        let won = store
            .claim(id, &[JobStatus::New, JobStatus::Wait], JobStatus::Init)
            .unwrap();
        assert_eq!(won.status, JobStatus::Init);

        // The second claimant must observe the first one's transition.
        let lost = store.claim(id, &[JobStatus::New, JobStatus::Wait], JobStatus::Init);
        assert!(matches!(
            lost,
            Err(StoreError::Conflict { found: JobStatus::Init, .. })
        ));
    }

    #[test]
    fn open_counts_exclude_terminal_descriptors() {
        let store = InMemoryDescriptorStore::new();
        store.create(descriptor(QueueKind::Large, "a")).unwrap();

        let mut waiting = descriptor(QueueKind::Large, "b");
        waiting.status = JobStatus::Wait;
        store.create(waiting).unwrap();

        let mut done = descriptor(QueueKind::Large, "c");
        done.status = JobStatus::Complete;
        store.create(done).unwrap();

        let mut broken = descriptor(QueueKind::Large, "d");
        broken.status = JobStatus::Broken;
        store.create(broken).unwrap();

        assert_eq!(store.count_open_by_kind(&QueueKind::Large).unwrap(), 2);
        assert_eq!(store.count_open_by_kind(&QueueKind::Immediate).unwrap(), 0);
    }

    proptest! {
        /// Property: whatever mix of queues and due times descriptors are
        /// created with, eligible candidates come back in creation order.
        #[test]
        fn eligible_new_is_fifo(count in 1usize..20) {
            let store = InMemoryDescriptorStore::new();
            let mut created = Vec::new();
            for i in 0..count {
                let d = descriptor(QueueKind::Queued, &format!("sig-{}", i));
                created.push(d.id);
                store.create(d).unwrap();
            }

            let eligible = store.find_eligible_new(&QueueKind::Queued, Utc::now()).unwrap();
            let ids: Vec<_> = eligible.iter().map(|d| d.id).collect();
            prop_assert_eq!(ids, created);
        }
    }
}
