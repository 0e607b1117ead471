//! Worker loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Background worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether this process runs worker loops.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of worker loops per registered queue.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Sleep after an empty pop or a store error.
    #[serde(default = "default_idle_sleep")]
    pub idle_sleep_seconds: u64,
    /// How long shutdown waits for in-flight handlers.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl WorkerConfig {
    /// Idle sleep as a [`Duration`].
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_secs(self.idle_sleep_seconds)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: default_concurrency(),
            idle_sleep_seconds: default_idle_sleep(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_idle_sleep() -> u64 {
    10
}

fn default_shutdown_timeout() -> u64 {
    30
}
