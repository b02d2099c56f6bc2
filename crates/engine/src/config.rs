//! Engine configuration.

use cogwork_core::Principal;

const DEFAULT_STALL_THRESHOLD: u32 = 3;
const DEFAULT_MEMORY_CEILING_MB: u64 = 128;
const DEFAULT_NOTIFY_TO: &str = "ops@localhost";

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Consecutive no-progress iterations (run loop) or check windows
    /// (health monitor) tolerated before a job is declared broken.
    pub stall_threshold: u32,
    /// Memory ceiling for the cooperative suspension watchdog.
    pub memory_ceiling_bytes: u64,
    /// Principal used when enqueue callers supply none.
    pub default_run_as: Principal,
    /// Recipient of stall/recovery operator notifications.
    pub notify_to: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            memory_ceiling_bytes: DEFAULT_MEMORY_CEILING_MB * 1024 * 1024,
            default_run_as: Principal::system(),
            notify_to: DEFAULT_NOTIFY_TO.to_string(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `COGWORK_STALL_THRESHOLD`,
    /// `COGWORK_MEMORY_CEILING_MB`, `COGWORK_RUN_AS`, `COGWORK_NOTIFY_TO`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("COGWORK_STALL_THRESHOLD") {
            match raw.parse() {
                Ok(value) => config.stall_threshold = value,
                Err(_) => {
                    tracing::warn!(value = %raw, "COGWORK_STALL_THRESHOLD is not a number; using default")
                }
            }
        }

        if let Ok(raw) = std::env::var("COGWORK_MEMORY_CEILING_MB") {
            match raw.parse::<u64>() {
                Ok(value) => config.memory_ceiling_bytes = value * 1024 * 1024,
                Err(_) => {
                    tracing::warn!(value = %raw, "COGWORK_MEMORY_CEILING_MB is not a number; using default")
                }
            }
        }

        if let Ok(raw) = std::env::var("COGWORK_RUN_AS") {
            if !raw.trim().is_empty() {
                config.default_run_as = Principal::new(raw.trim());
            }
        }

        if let Ok(raw) = std::env::var("COGWORK_NOTIFY_TO") {
            if !raw.trim().is_empty() {
                config.notify_to = raw.trim().to_string();
            }
        }

        config
    }
}
