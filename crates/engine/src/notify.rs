//! Operator notifications for stall and recovery events.

use thiserror::Error;

/// An operator-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notice {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivery seam for operator notifications.
///
/// Delivery failures must never abort job execution; callers log and move
/// on.
pub trait Notifier: Send + Sync {
    fn send(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Default notifier: records the notice in the process log instead of
/// delivering it anywhere.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn send(&self, notice: &Notice) -> Result<(), NotifyError> {
        tracing::info!(
            to = %notice.to,
            subject = %notice.subject,
            body = %notice.body,
            "operator notification"
        );
        Ok(())
    }
}
