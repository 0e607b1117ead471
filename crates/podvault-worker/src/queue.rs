//! Task queue API over the `queue_task` table.
//!
//! Delivery is at-least-once: a popped task is hidden for the visibility
//! timeout and reappears if it is neither completed nor returned. Every
//! pop increments `receive_count`; once it exceeds `max_receives` the task
//! is never leased again but stays in the table for operators.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use podvault_core::config::QueueConfig;
use podvault_core::error::AppError;
use podvault_core::result::AppResult;
use podvault_core::types::Clock;
use podvault_database::repositories::QueueTaskRepository;
use podvault_entity::queue::{QueueStats, QueueTask};

/// Push, pop, complete and return tasks.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    /// Queue task persistence
    repo: Arc<QueueTaskRepository>,
    /// Lease and retry settings
    config: QueueConfig,
    /// Source of "now"
    clock: Arc<dyn Clock>,
}

impl TaskQueue {
    /// Create a new task queue
    pub fn new(repo: Arc<QueueTaskRepository>, config: QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Lease and retry settings in use
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// The clock every timestamp comes from
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Enqueue a task that is immediately visible. Returns its id.
    pub async fn push<T>(&self, queue_name: &str, payload: &T) -> AppResult<i64>
    where
        T: Serialize + ?Sized,
    {
        let payload = self.encode(queue_name, payload)?;
        let id = self.repo.insert(queue_name, &payload, self.clock.now()).await?;

        tracing::debug!(queue = queue_name, task_id = id, "Pushed task");
        Ok(id)
    }

    /// Enqueue a task on an existing connection, typically inside a
    /// transaction so the insert commits together with other writes.
    pub async fn push_with<T>(
        &self,
        conn: &mut SqliteConnection,
        queue_name: &str,
        payload: &T,
    ) -> AppResult<i64>
    where
        T: Serialize + ?Sized,
    {
        let payload = self.encode(queue_name, payload)?;
        let id =
            QueueTaskRepository::insert_with(&mut *conn, queue_name, &payload, self.clock.now())
                .await?;

        tracing::debug!(queue = queue_name, task_id = id, "Pushed task in transaction");
        Ok(id)
    }

    /// Lease the oldest eligible task of `queue_name`.
    ///
    /// Returns a `NotFound` error when nothing is eligible. The returned
    /// task carries the incremented `receive_count`.
    pub async fn pop(&self, queue_name: &str) -> AppResult<QueueTask> {
        let now = self.clock.now();
        let lease_until = add_delay(now, duration_to_delta(self.config.visibility_timeout()));

        self.repo
            .lease_next(queue_name, now, lease_until, self.config.max_receives)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No eligible task in queue '{queue_name}'")))
    }

    /// Delete a finished task. Completing a task that is already gone is
    /// not an error.
    pub async fn complete(&self, task: &QueueTask) -> AppResult<()> {
        let deleted = self.repo.delete(task.id).await?;
        if deleted == 0 {
            tracing::debug!(task_id = task.id, "Completed task was already deleted");
        }
        Ok(())
    }

    /// Hand a failed task back for a later retry.
    ///
    /// Sets `visible_after = now + backoff_delay(receive_count)` and leaves
    /// `receive_count` untouched. Returns the new `visible_after`.
    pub async fn return_task(&self, task: &QueueTask) -> AppResult<DateTime<Utc>> {
        let visible_after = add_delay(self.clock.now(), self.backoff_delay(task.receive_count));

        if self.repo.set_visible_after(task.id, visible_after).await? == 0 {
            return Err(AppError::not_found(format!(
                "Task {} no longer exists",
                task.id
            )));
        }
        Ok(visible_after)
    }

    /// Delay before a task received `receive_count` times is visible again:
    /// `backoff_interval * backoff_exponent^(receive_count - 1)`.
    ///
    /// Saturates instead of overflowing.
    pub fn backoff_delay(&self, receive_count: i64) -> TimeDelta {
        let retries = u32::try_from(receive_count.saturating_sub(1).max(0)).unwrap_or(u32::MAX);
        let factor = u64::from(self.config.backoff_exponent).saturating_pow(retries);
        let millis = self
            .config
            .backoff_interval_seconds
            .saturating_mul(1000)
            .saturating_mul(factor);

        i64::try_from(millis)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Task counts by derived state, for one queue or all queues.
    pub async fn stats(&self, queue_name: Option<&str>) -> AppResult<QueueStats> {
        self.repo
            .count_by_state(queue_name, self.clock.now(), self.config.max_receives)
            .await
    }

    /// Exhausted tasks, oldest first.
    pub async fn list_exhausted(
        &self,
        queue_name: Option<&str>,
        limit: i64,
    ) -> AppResult<Vec<QueueTask>> {
        self.repo
            .find_exhausted(queue_name, self.config.max_receives, limit.max(0))
            .await
    }

    /// Number of exhausted tasks per queue.
    pub async fn exhausted_by_queue(&self) -> AppResult<Vec<(String, i64)>> {
        self.repo
            .exhausted_counts_by_queue(self.config.max_receives)
            .await
    }

    /// Give an exhausted task a fresh set of deliveries, visible immediately.
    ///
    /// Pending and leased tasks are rejected with a `Validation` error so a
    /// live lease is never cut short; an unknown id is `NotFound`.
    pub async fn requeue(&self, task_id: i64) -> AppResult<()> {
        let reset = self
            .repo
            .reset_exhausted(task_id, self.clock.now(), self.config.max_receives)
            .await?;
        if reset == 0 {
            return match self.repo.find_by_id(task_id).await? {
                Some(task) => Err(AppError::validation(format!(
                    "Task {task_id} is {} and cannot be requeued",
                    task.state(self.clock.now(), self.config.max_receives)
                ))),
                None => Err(AppError::not_found(format!("Task {task_id} not found"))),
            };
        }
        tracing::info!(task_id, "Requeued task");
        Ok(())
    }

    /// Delete exhausted tasks. Returns how many were removed.
    pub async fn purge_exhausted(&self, queue_name: Option<&str>) -> AppResult<u64> {
        let purged = self
            .repo
            .delete_exhausted(queue_name, self.config.max_receives)
            .await?;
        tracing::info!(queue = queue_name.unwrap_or("*"), purged, "Purged exhausted tasks");
        Ok(purged)
    }

    fn encode<T>(&self, queue_name: &str, payload: &T) -> AppResult<String>
    where
        T: Serialize + ?Sized,
    {
        if queue_name.trim().is_empty() {
            return Err(AppError::validation("Queue name must not be empty"));
        }
        let encoded = serde_json::to_string(payload)?;
        if encoded.len() > self.config.max_payload_bytes {
            return Err(AppError::validation(format!(
                "Payload of {} bytes exceeds the {} byte limit",
                encoded.len(),
                self.config.max_payload_bytes
            )));
        }
        Ok(encoded)
    }
}

fn duration_to_delta(d: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

fn add_delay(now: DateTime<Utc>, delay: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(delay)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
