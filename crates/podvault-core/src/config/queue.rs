//! Task queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lease, retry and validation settings for the task queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How long a popped task stays hidden from other consumers.
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_seconds: u64,
    /// Deliveries beyond this count make a task exhausted.
    #[serde(default = "default_max_receives")]
    pub max_receives: u32,
    /// Delay before the first retry of a returned task.
    #[serde(default = "default_backoff_interval")]
    pub backoff_interval_seconds: u64,
    /// Growth factor applied to the delay on each further retry.
    #[serde(default = "default_backoff_exponent")]
    pub backoff_exponent: u32,
    /// Largest accepted serialized payload, in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl QueueConfig {
    /// Visibility timeout as a [`Duration`].
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }

    /// Base backoff interval as a [`Duration`].
    pub fn backoff_interval(&self) -> Duration {
        Duration::from_secs(self.backoff_interval_seconds)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_seconds: default_visibility_timeout(),
            max_receives: default_max_receives(),
            backoff_interval_seconds: default_backoff_interval(),
            backoff_exponent: default_backoff_exponent(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_visibility_timeout() -> u64 {
    30 * 60
}

fn default_max_receives() -> u32 {
    5
}

fn default_backoff_interval() -> u64 {
    10
}

fn default_backoff_exponent() -> u32 {
    2
}

fn default_max_payload_bytes() -> usize {
    64 * 1024
}
