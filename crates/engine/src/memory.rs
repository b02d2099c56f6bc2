//! Process memory sampling for the run loop's watchdog.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sysinfo::System;

/// Source of the current process's memory footprint.
pub trait MemoryProbe: Send + Sync {
    fn used_bytes(&self) -> u64;
}

/// Probe backed by the operating system's view of this process.
#[derive(Debug, Default)]
pub struct SystemMemoryProbe;

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn used_bytes(&self) -> u64 {
        let mut system = System::new_all();
        system.refresh_all();

        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                tracing::warn!(error = %e, "could not resolve current pid for memory probe");
                return 0;
            }
        };

        system.process(pid).map(|process| process.memory()).unwrap_or(0)
    }
}

/// Probe with an externally controlled reading, for tests/dev.
#[derive(Debug, Default)]
pub struct ManualMemoryProbe {
    used: Arc<AtomicU64>,
}

impl ManualMemoryProbe {
    pub fn new(bytes: u64) -> Self {
        Self {
            used: Arc::new(AtomicU64::new(bytes)),
        }
    }

    /// Shared handle for adjusting the reading mid-run.
    pub fn handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.used)
    }

    pub fn set(&self, bytes: u64) {
        self.used.store(bytes, Ordering::SeqCst);
    }
}

impl MemoryProbe for ManualMemoryProbe {
    fn used_bytes(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_probe_tracks_its_handle() {
        let probe = ManualMemoryProbe::new(10);
        assert_eq!(probe.used_bytes(), 10);

        probe.handle().store(512, Ordering::SeqCst);
        assert_eq!(probe.used_bytes(), 512);
    }
}
