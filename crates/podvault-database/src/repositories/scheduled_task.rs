//! Scheduled task state repository implementation.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_entity::queue::ScheduledTaskState;
use podvault_entity::timestamp::to_millis;

/// Repository for `scheduled_task_state` rows.
#[derive(Debug, Clone)]
pub struct ScheduledTaskRepository {
    pool: SqlitePool,
}

impl ScheduledTaskRepository {
    /// Create a new scheduled task repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Return the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a state row with `last_run_time` at the Unix epoch unless one
    /// already exists. Returns `true` when a row was created.
    pub async fn provision(&self, task_name: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO scheduled_task_state (task_name, last_run_time) VALUES (?, 0) \
             ON CONFLICT (task_name) DO NOTHING",
        )
        .bind(task_name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to provision scheduled task", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    /// Insert or overwrite a state row.
    pub async fn upsert(&self, task_name: &str, last_run_time: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO scheduled_task_state (task_name, last_run_time) VALUES (?, ?) \
             ON CONFLICT (task_name) DO UPDATE SET last_run_time = excluded.last_run_time",
        )
        .bind(task_name)
        .bind(to_millis(last_run_time))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to save scheduled task", e)
        })?;
        Ok(())
    }

    /// Find the state of one task.
    pub async fn find(&self, task_name: &str) -> AppResult<Option<ScheduledTaskState>> {
        sqlx::query_as::<_, ScheduledTaskState>(
            "SELECT task_name, last_run_time FROM scheduled_task_state WHERE task_name = ?",
        )
        .bind(task_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find scheduled task", e))
    }

    /// List all task states by name.
    pub async fn find_all(&self) -> AppResult<Vec<ScheduledTaskState>> {
        sqlx::query_as::<_, ScheduledTaskState>(
            "SELECT task_name, last_run_time FROM scheduled_task_state ORDER BY task_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list scheduled tasks", e)
        })
    }

    /// Set `last_run_time = now` if the task last ran at or before `cutoff`.
    ///
    /// Returns `true` when this caller won the claim. At most one of any
    /// number of concurrent callers with the same `cutoff` can win.
    pub async fn claim_due<'e, E>(
        executor: E,
        task_name: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> AppResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE scheduled_task_state SET last_run_time = ? \
             WHERE task_name = ? AND last_run_time <= ?",
        )
        .bind(to_millis(now))
        .bind(task_name)
        .bind(to_millis(cutoff))
        .execute(executor)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to claim scheduled task", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    /// Whether a state row exists for `task_name`.
    pub async fn exists<'e, E>(executor: E, task_name: &str) -> AppResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM scheduled_task_state WHERE task_name = ?",
        )
        .bind(task_name)
        .fetch_one(executor)
        .await
        .map(|count| count > 0)
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find scheduled task", e))
    }
}
