//! Recurring task entities.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use podvault_core::config::{MAX_TASK_NAME_LEN, ScheduledTaskConfig};
use podvault_core::error::AppError;

use crate::timestamp;

/// Persisted state of one recurring task (`scheduled_task_state` row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTaskState {
    /// Task name (primary key).
    pub task_name: String,
    /// When the task was last enqueued. The Unix epoch means "never".
    pub last_run_time: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for ScheduledTaskState {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            task_name: row.try_get("task_name")?,
            last_run_time: timestamp::from_millis(row.try_get("last_run_time")?)?,
        })
    }
}

/// A statically configured recurring task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTaskDefinition {
    /// Unique task name.
    pub task_name: String,
    /// Queue the marker task is pushed to.
    pub queue_name: String,
    /// Minimum time between two enqueues.
    pub interval: Duration,
}

impl ScheduledTaskDefinition {
    /// Define a task that enqueues into the queue of the same name.
    pub fn new(task_name: impl Into<String>, interval: Duration) -> Self {
        let task_name = task_name.into();
        Self {
            queue_name: task_name.clone(),
            task_name,
            interval,
        }
    }

    /// Enqueue into a differently named queue.
    pub fn with_queue(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Check the name and interval constraints.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.task_name.trim().is_empty() || self.task_name.len() > MAX_TASK_NAME_LEN {
            return Err(AppError::validation(format!(
                "scheduled task name '{}' must be 1..={MAX_TASK_NAME_LEN} characters",
                self.task_name
            )));
        }
        if self.queue_name.trim().is_empty() {
            return Err(AppError::validation(format!(
                "scheduled task '{}' has an empty queue name",
                self.task_name
            )));
        }
        if self.interval.is_zero() {
            return Err(AppError::validation(format!(
                "scheduled task '{}' must have a positive interval",
                self.task_name
            )));
        }
        Ok(())
    }

    /// Latest `last_run_time` at which the task counts as due at `now`,
    /// i.e. due when `now - last_run_time >= interval`.
    pub fn due_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.interval)
            .ok()
            .and_then(|interval| now.checked_sub_signed(interval))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whether a task last run at `last_run_time` is due at `now`.
    pub fn is_due(&self, last_run_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        last_run_time <= self.due_cutoff(now)
    }
}

impl From<&ScheduledTaskConfig> for ScheduledTaskDefinition {
    fn from(config: &ScheduledTaskConfig) -> Self {
        Self::new(config.task_name.clone(), config.interval()).with_queue(config.target_queue())
    }
}
