//! Stall detection and bounded automatic recovery.

use std::sync::Arc;

use cogwork_core::{JobId, Severity};

use crate::config::EngineConfig;
use crate::descriptor::JobStatus;
use crate::error::EngineError;
use crate::notify::{Notice, Notifier};
use crate::store::DescriptorStore;

/// Result of one health check pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Run descriptors examined.
    pub checked: usize,
    /// Stalled jobs parked for automatic resumption.
    pub resumed: Vec<JobId>,
    /// Stalled jobs past the resume budget, now permanently broken.
    pub broken: Vec<JobId>,
}

/// Scans active descriptors once per invocation, before job selection.
///
/// A Run descriptor whose step counter has not moved since the previous
/// check is stalled: within the resume budget it is parked back to Wait so
/// the scheduler resumes it; past the budget it is broken for good. Either
/// way the operator is notified, and every Run descriptor gets a fresh
/// progress baseline for the next window.
pub struct HealthMonitor {
    store: Arc<dyn DescriptorStore>,
    notifier: Arc<dyn Notifier>,
    stall_threshold: u32,
    notify_to: String,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<dyn DescriptorStore>,
        notifier: Arc<dyn Notifier>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            stall_threshold: config.stall_threshold,
            notify_to: config.notify_to.clone(),
        }
    }

    pub fn check(&self) -> Result<HealthReport, EngineError> {
        let running = self.store.find_by_status(JobStatus::Run)?;
        let mut report = HealthReport {
            checked: running.len(),
            ..HealthReport::default()
        };

        for mut descriptor in running {
            let stalled = descriptor.steps_processed > 0
                && descriptor.last_processed_count == Some(descriptor.steps_processed);

            if stalled {
                descriptor.resume_count += 1;
                if descriptor.resume_count <= self.stall_threshold {
                    descriptor.append_message(
                        Severity::Warn,
                        format!(
                            "no progress since the previous health check; automatic restart {} of {}",
                            descriptor.resume_count, self.stall_threshold
                        ),
                    );
                    descriptor.mark_wait();
                    self.notify(
                        format!("Restarting stalled job: {}", descriptor.title),
                        format!(
                            "Job {} ({}) made no progress at step {} and was scheduled \
                             for automatic restart ({} of {}).",
                            descriptor.id,
                            descriptor.title,
                            descriptor.steps_processed,
                            descriptor.resume_count,
                            self.stall_threshold
                        ),
                    );
                    tracing::warn!(
                        job = %descriptor.id,
                        resume_count = descriptor.resume_count,
                        "stalled job parked for automatic restart"
                    );
                    report.resumed.push(descriptor.id);
                } else {
                    descriptor.append_message(
                        Severity::Error,
                        "job stalled beyond the resume budget; manual intervention required",
                    );
                    descriptor.mark_broken();
                    self.notify(
                        format!("Broken job needs attention: {}", descriptor.title),
                        format!(
                            "Job {} ({}) stalled {} times at step {} and will not be \
                             restarted automatically.",
                            descriptor.id,
                            descriptor.title,
                            descriptor.resume_count,
                            descriptor.steps_processed
                        ),
                    );
                    tracing::error!(
                        job = %descriptor.id,
                        resume_count = descriptor.resume_count,
                        "stalled job broken; manual intervention required"
                    );
                    report.broken.push(descriptor.id);
                }
            }

            // Fresh baseline for the next check window, stalled or not.
            descriptor.last_processed_count = Some(descriptor.steps_processed);
            self.store.update(&descriptor)?;
        }

        Ok(report)
    }

    fn notify(&self, subject: String, body: String) {
        let notice = Notice::new(self.notify_to.clone(), subject, body);
        if let Err(error) = self.notifier.send(&notice) {
            // Delivery is best effort; a broken mailer must not stop jobs.
            tracing::warn!(error = %error, subject = %notice.subject, "operator notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::JobDescriptor;
    use crate::notify::NotifyError;
    use crate::store::InMemoryDescriptorStore;
    use cogwork_core::{JobSignature, JobSnapshot, Principal, QueueKind};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notice>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, notice: &Notice) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notice.clone());
            if self.fail {
                Err(NotifyError("smtp unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn running_descriptor(steps: u64, baseline: Option<u64>) -> JobDescriptor {
        let mut descriptor = JobDescriptor::new(
            "import",
            "test.import",
            JobSignature::raw("sig"),
            QueueKind::Queued,
            None,
            Principal::system(),
            JobSnapshot::new(100, json!({})),
        );
        descriptor.status = JobStatus::Run;
        descriptor.steps_processed = steps;
        descriptor.last_processed_count = baseline;
        descriptor
    }

    fn monitor(
        store: Arc<InMemoryDescriptorStore>,
        notifier: Arc<RecordingNotifier>,
    ) -> HealthMonitor {
        HealthMonitor::new(store, notifier, &EngineConfig::default())
    }

    #[test]
    fn progressing_jobs_only_get_a_new_baseline() {
        let store = Arc::new(InMemoryDescriptorStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let descriptor = running_descriptor(10, Some(4));
        let id = descriptor.id;
        store.create(descriptor).unwrap();

        let report = monitor(store.clone(), notifier.clone()).check().unwrap();
        assert_eq!(report.checked, 1);
        assert!(report.resumed.is_empty());
        assert!(report.broken.is_empty());

        let refreshed = store.find_by_id(id).unwrap();
        assert_eq!(refreshed.status, JobStatus::Run);
        assert_eq!(refreshed.last_processed_count, Some(10));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn jobs_before_their_first_step_are_not_stalled() {
        let store = Arc::new(InMemoryDescriptorStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let descriptor = running_descriptor(0, Some(0));
        let id = descriptor.id;
        store.create(descriptor).unwrap();

        monitor(store.clone(), notifier.clone()).check().unwrap();
        assert_eq!(store.find_by_id(id).unwrap().status, JobStatus::Run);
    }

    #[test]
    fn stalled_job_is_parked_then_broken_past_the_budget() {
        let store = Arc::new(InMemoryDescriptorStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let descriptor = running_descriptor(7, Some(7));
        let id = descriptor.id;
        store.create(descriptor).unwrap();

        let health = monitor(store.clone(), notifier.clone());

        // Three stalled windows in a row: parked for automatic restart.
        for attempt in 1..=3u32 {
            let report = health.check().unwrap();
            assert_eq!(report.resumed, vec![id]);

            let parked = store.find_by_id(id).unwrap();
            assert_eq!(parked.status, JobStatus::Wait);
            assert_eq!(parked.resume_count, attempt);

            // Simulate the scheduler resuming it without any progress.
            let mut resumed = parked;
            resumed.status = JobStatus::Run;
            store.update(&resumed).unwrap();
        }

        // Fourth window: the budget is spent.
        let report = health.check().unwrap();
        assert_eq!(report.broken, vec![id]);
        let broken = store.find_by_id(id).unwrap();
        assert_eq!(broken.status, JobStatus::Broken);
        assert_eq!(broken.resume_count, 4);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 4);
        assert!(sent[0].subject.contains("Restarting stalled job"));
        assert!(sent[3].subject.contains("manual") || sent[3].subject.contains("attention"));
    }

    #[test]
    fn notification_failures_do_not_stop_the_check() {
        let store = Arc::new(InMemoryDescriptorStore::new());
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });
        let descriptor = running_descriptor(3, Some(3));
        let id = descriptor.id;
        store.create(descriptor).unwrap();

        let report = monitor(store.clone(), notifier).check().unwrap();
        assert_eq!(report.resumed, vec![id]);
        assert_eq!(store.find_by_id(id).unwrap().status, JobStatus::Wait);
    }
}
