//! Recurring task scheduler.
//!
//! Each configured task owns one `scheduled_task_state` row. A tick claims
//! the row with a conditional `UPDATE` and pushes the marker task in the
//! same transaction, so with any number of schedulers sharing the database
//! a task is enqueued at most once per interval.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use podvault_core::config::SchedulerConfig;
use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_core::types::Clock;
use podvault_database::repositories::ScheduledTaskRepository;
use podvault_entity::queue::ScheduledTaskDefinition;

use crate::queue::TaskQueue;

/// Result of processing one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The interval elapsed and a task was pushed.
    Enqueued {
        /// Id of the pushed queue task
        task_id: i64,
    },
    /// The interval has not elapsed yet.
    NotDue,
}

/// What one tick did across all configured tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// `(task_name, queue_task_id)` for every task enqueued
    pub enqueued: Vec<(String, i64)>,
    /// Number of tasks that were not due
    pub not_due: usize,
    /// Names of tasks whose processing failed
    pub failed: Vec<String>,
}

/// Periodic scheduler for recurring tasks
#[derive(Debug)]
pub struct TaskScheduler {
    /// Persisted per-task state
    repo: Arc<ScheduledTaskRepository>,
    /// Queue the marker tasks are pushed to
    queue: Arc<TaskQueue>,
    /// Configured tasks, in order
    tasks: Vec<ScheduledTaskDefinition>,
    /// Time between ticks
    poll_interval: Duration,
    /// Source of "now"
    clock: Arc<dyn Clock>,
}

impl TaskScheduler {
    /// Create a scheduler for `tasks`. Names must be unique and valid.
    pub fn new(
        repo: Arc<ScheduledTaskRepository>,
        queue: Arc<TaskQueue>,
        tasks: Vec<ScheduledTaskDefinition>,
        poll_interval: Duration,
    ) -> AppResult<Self> {
        let mut seen = HashSet::new();
        for task in &tasks {
            task.validate()?;
            if !seen.insert(task.task_name.as_str()) {
                return Err(AppError::validation(format!(
                    "Scheduled task '{}' is defined twice",
                    task.task_name
                )));
            }
        }
        if poll_interval.is_zero() {
            return Err(AppError::validation("Scheduler poll interval must be positive"));
        }

        let clock = Arc::clone(queue.clock());
        Ok(Self {
            repo,
            queue,
            tasks,
            poll_interval,
            clock,
        })
    }

    /// Create a scheduler from the `[scheduler]` configuration section.
    pub fn from_config(
        repo: Arc<ScheduledTaskRepository>,
        queue: Arc<TaskQueue>,
        config: &SchedulerConfig,
    ) -> AppResult<Self> {
        let tasks = config
            .tasks
            .iter()
            .map(ScheduledTaskDefinition::from)
            .collect();
        Self::new(repo, queue, tasks, config.poll_interval())
    }

    /// Configured tasks, in order
    pub fn tasks(&self) -> &[ScheduledTaskDefinition] {
        &self.tasks
    }

    /// Create missing state rows with a last run at the Unix epoch, so
    /// every new task is due on the first tick. Existing rows are kept.
    /// Returns how many rows were created.
    pub async fn setup_state(&self) -> AppResult<usize> {
        let mut created = 0;
        for task in &self.tasks {
            if self.repo.provision(&task.task_name).await? {
                tracing::info!(task_name = %task.task_name, "Provisioned scheduled task state");
                created += 1;
            }
        }
        Ok(created)
    }

    /// Enqueue `task` if its interval has elapsed.
    ///
    /// Claiming the state row and pushing the queue task commit together or
    /// not at all. A missing state row is a `NotFound` error; rows are only
    /// created by [`setup_state`](Self::setup_state).
    pub async fn process_task(&self, task: &ScheduledTaskDefinition) -> AppResult<TickOutcome> {
        let now = self.clock.now();
        let cutoff = task.due_cutoff(now);

        let mut tx = self.repo.pool().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let claimed =
            ScheduledTaskRepository::claim_due(&mut *tx, &task.task_name, now, cutoff).await?;
        if !claimed {
            let exists = ScheduledTaskRepository::exists(&mut *tx, &task.task_name).await?;
            // Dropping the transaction rolls it back.
            drop(tx);
            if !exists {
                return Err(AppError::not_found(format!(
                    "No state row for scheduled task '{}'",
                    task.task_name
                )));
            }
            return Ok(TickOutcome::NotDue);
        }

        let task_id = self
            .queue
            .push_with(&mut tx, &task.queue_name, &Value::Null)
            .await?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit scheduled task", e)
        })?;

        Ok(TickOutcome::Enqueued { task_id })
    }

    /// Process every configured task once. Failures are logged and do not
    /// stop the remaining tasks.
    pub async fn tick(&self) -> TickSummary {
        let mut summary = TickSummary::default();
        for task in &self.tasks {
            match self.process_task(task).await {
                Ok(TickOutcome::Enqueued { task_id }) => {
                    tracing::info!(
                        task_name = %task.task_name,
                        queue = %task.queue_name,
                        task_id,
                        "Enqueued scheduled task"
                    );
                    summary.enqueued.push((task.task_name.clone(), task_id));
                }
                Ok(TickOutcome::NotDue) => {
                    tracing::trace!(task_name = %task.task_name, "Scheduled task not due");
                    summary.not_due += 1;
                }
                Err(e) => {
                    tracing::error!(
                        task_name = %task.task_name,
                        error = %e,
                        "Failed to process scheduled task"
                    );
                    summary.failed.push(task.task_name.clone());
                }
            }
        }
        summary
    }

    /// Tick every poll interval until the cancel signal is received.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            tasks = self.tasks.len(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "Scheduler started"
        );

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *cancel.borrow() {
                break;
            }
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }
}
