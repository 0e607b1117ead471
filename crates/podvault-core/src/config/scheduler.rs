//! Recurring task scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether this process runs a scheduler loop.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scheduler ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Ordered list of recurring tasks.
    #[serde(default = "default_tasks")]
    pub tasks: Vec<ScheduledTaskConfig>,
}

impl SchedulerConfig {
    /// Tick interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: default_poll_interval(),
            tasks: default_tasks(),
        }
    }
}

/// One recurring task entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTaskConfig {
    /// Unique task name, also the key of its persisted state row.
    pub task_name: String,
    /// Queue the task marker is pushed to. Defaults to `task_name`.
    #[serde(default)]
    pub queue: Option<String>,
    /// Minimum seconds between two enqueues.
    pub interval_seconds: u64,
}

impl ScheduledTaskConfig {
    /// The queue this task enqueues into.
    pub fn target_queue(&self) -> &str {
        self.queue.as_deref().unwrap_or(&self.task_name)
    }

    /// Interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

fn default_tasks() -> Vec<ScheduledTaskConfig> {
    vec![
        ScheduledTaskConfig {
            task_name: "feedWorker".to_string(),
            queue: None,
            interval_seconds: 60,
        },
        ScheduledTaskConfig {
            task_name: "houseKeeping".to_string(),
            queue: None,
            interval_seconds: 60 * 60,
        },
    ]
}
