//! Queue kinds — named partitions of work scheduled independently.

use serde::{Deserialize, Serialize};

/// A queue a job belongs to.
///
/// Each kind is scheduled independently: triggers name one kind per
/// invocation and the engine never orders work across kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Run as soon as possible, including the teardown drain.
    Immediate,
    /// The default queue for ordinary background work.
    Queued,
    /// Long-running, resource-heavy work.
    Large,
    /// Caller-defined partition.
    Custom(String),
}

impl QueueKind {
    /// Numeric selector for the three well-known kinds (trigger protocol:
    /// immediate = 1, default = 2, large = 3). Custom kinds have none.
    pub fn number(&self) -> Option<u8> {
        match self {
            Self::Immediate => Some(1),
            Self::Queued => Some(2),
            Self::Large => Some(3),
            Self::Custom(_) => None,
        }
    }

    /// Parse a trigger argument: a well-known name, its number, or a custom
    /// queue name. An empty argument selects the default queue.
    pub fn from_selector(arg: &str) -> Self {
        match arg.trim().to_ascii_lowercase().as_str() {
            "" | "2" | "queued" | "default" => Self::Queued,
            "1" | "immediate" => Self::Immediate,
            "3" | "large" => Self::Large,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Immediate => "immediate",
            Self::Queued => "queued",
            Self::Large => "large",
            Self::Custom(name) => name,
        }
    }
}

impl core::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_names_and_numbers_agree() {
        assert_eq!(QueueKind::from_selector("immediate"), QueueKind::Immediate);
        assert_eq!(QueueKind::from_selector("1"), QueueKind::Immediate);
        assert_eq!(QueueKind::from_selector("large"), QueueKind::Large);
        assert_eq!(QueueKind::from_selector("3"), QueueKind::Large);
        assert_eq!(QueueKind::from_selector("queued"), QueueKind::Queued);
        assert_eq!(QueueKind::from_selector("default"), QueueKind::Queued);
        assert_eq!(QueueKind::from_selector("2"), QueueKind::Queued);
        assert_eq!(QueueKind::from_selector(""), QueueKind::Queued);
    }

    #[test]
    fn unknown_selector_becomes_custom() {
        assert_eq!(
            QueueKind::from_selector("Reindex"),
            QueueKind::Custom("reindex".to_string())
        );
        assert_eq!(QueueKind::from_selector("reindex").number(), None);
    }

    #[test]
    fn well_known_numbers() {
        assert_eq!(QueueKind::Immediate.number(), Some(1));
        assert_eq!(QueueKind::Queued.number(), Some(2));
        assert_eq!(QueueKind::Large.number(), Some(3));
    }
}
