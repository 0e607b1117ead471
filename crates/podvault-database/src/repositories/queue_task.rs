//! Queue task repository implementation.
//!
//! Every statement that changes which consumer owns a task is a single
//! conditional `UPDATE`; SQLite's database-level write lock serializes them,
//! so two concurrent leases can never return the same row.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_entity::queue::{QueueStats, QueueTask};
use podvault_entity::timestamp::to_millis;

const TASK_COLUMNS: &str = "id, queue_name, created_at, visible_after, receive_count, payload";

/// Repository for queue task rows.
#[derive(Debug, Clone)]
pub struct QueueTaskRepository {
    pool: SqlitePool,
}

impl QueueTaskRepository {
    /// Create a new queue task repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Return the underlying pool (for callers that open transactions).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a new task that is visible immediately. Returns its id.
    pub async fn insert(&self, queue_name: &str, payload: &str, now: DateTime<Utc>) -> AppResult<i64> {
        Self::insert_with(&self.pool, queue_name, payload, now).await
    }

    /// Insert a new task through an arbitrary executor, e.g. a transaction.
    pub async fn insert_with<'e, E>(
        executor: E,
        queue_name: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> AppResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = to_millis(now);
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO queue_task (queue_name, created_at, visible_after, receive_count, payload) \
             VALUES (?, ?, ?, 0, ?) RETURNING id",
        )
        .bind(queue_name)
        .bind(now)
        .bind(now)
        .bind(payload)
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert queue task", e))
    }

    /// Lease the oldest eligible task of a queue.
    ///
    /// Eligible means `visible_after <= now` and
    /// `receive_count <= max_receives`. The chosen row gets
    /// `visible_after = lease_until` and `receive_count + 1` in the same
    /// statement.
    pub async fn lease_next(
        &self,
        queue_name: &str,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        max_receives: u32,
    ) -> AppResult<Option<QueueTask>> {
        sqlx::query_as::<_, QueueTask>(&format!(
            "UPDATE queue_task SET visible_after = ?, receive_count = receive_count + 1 \
             WHERE id = ( \
                SELECT id FROM queue_task \
                WHERE queue_name = ? AND visible_after <= ? AND receive_count <= ? \
                ORDER BY created_at ASC, id ASC \
                LIMIT 1 \
             ) RETURNING {TASK_COLUMNS}"
        ))
        .bind(to_millis(lease_until))
        .bind(queue_name)
        .bind(to_millis(now))
        .bind(i64::from(max_receives))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lease queue task", e))
    }

    /// Find a task by id.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<QueueTask>> {
        sqlx::query_as::<_, QueueTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM queue_task WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find queue task", e))
    }

    /// Delete a task. Returns the number of rows removed (0 or 1).
    pub async fn delete(&self, id: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM queue_task WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete queue task", e)
            })?;
        Ok(result.rows_affected())
    }

    /// Move a task's visibility to `at`, leaving its receive count alone.
    pub async fn set_visible_after(&self, id: i64, at: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("UPDATE queue_task SET visible_after = ? WHERE id = ?")
            .bind(to_millis(at))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to return queue task", e)
            })?;
        Ok(result.rows_affected())
    }

    /// Count tasks by derived state, for one queue or all queues.
    pub async fn count_by_state(
        &self,
        queue_name: Option<&str>,
        now: DateTime<Utc>,
        max_receives: u32,
    ) -> AppResult<QueueStats> {
        let max = i64::from(max_receives);
        let now = to_millis(now);
        let row = sqlx::query(
            "SELECT \
                COALESCE(SUM(CASE WHEN receive_count <= ? AND visible_after <= ? THEN 1 ELSE 0 END), 0) AS pending, \
                COALESCE(SUM(CASE WHEN receive_count <= ? AND visible_after > ? THEN 1 ELSE 0 END), 0) AS leased, \
                COALESCE(SUM(CASE WHEN receive_count > ? THEN 1 ELSE 0 END), 0) AS exhausted \
             FROM queue_task WHERE (? IS NULL OR queue_name = ?)",
        )
        .bind(max)
        .bind(now)
        .bind(max)
        .bind(now)
        .bind(max)
        .bind(queue_name)
        .bind(queue_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count queue tasks", e))?;

        let get = |column: &str| {
            row.try_get::<i64, _>(column).map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to read queue counts", e)
            })
        };
        Ok(QueueStats {
            pending: get("pending")?,
            leased: get("leased")?,
            exhausted: get("exhausted")?,
        })
    }

    /// List exhausted tasks, oldest first.
    pub async fn find_exhausted(
        &self,
        queue_name: Option<&str>,
        max_receives: u32,
        limit: i64,
    ) -> AppResult<Vec<QueueTask>> {
        sqlx::query_as::<_, QueueTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM queue_task \
             WHERE receive_count > ? AND (? IS NULL OR queue_name = ?) \
             ORDER BY created_at ASC, id ASC LIMIT ?"
        ))
        .bind(i64::from(max_receives))
        .bind(queue_name)
        .bind(queue_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list exhausted tasks", e)
        })
    }

    /// Number of exhausted tasks per queue, for queues that have any.
    pub async fn exhausted_counts_by_queue(&self, max_receives: u32) -> AppResult<Vec<(String, i64)>> {
        sqlx::query_as::<_, (String, i64)>(
            "SELECT queue_name, COUNT(*) FROM queue_task \
             WHERE receive_count > ? GROUP BY queue_name ORDER BY queue_name",
        )
        .bind(i64::from(max_receives))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count exhausted tasks", e)
        })
    }

    /// Make an exhausted task deliverable again from scratch: zero receives,
    /// visible at `now`. Tasks that are pending or leased are left alone.
    pub async fn reset_exhausted(
        &self,
        id: i64,
        now: DateTime<Utc>,
        max_receives: u32,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE queue_task SET receive_count = 0, visible_after = ? \
             WHERE id = ? AND receive_count > ?",
        )
        .bind(to_millis(now))
        .bind(id)
        .bind(i64::from(max_receives))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to requeue task", e))?;
        Ok(result.rows_affected())
    }

    /// Delete exhausted tasks, for one queue or all queues.
    pub async fn delete_exhausted(&self, queue_name: Option<&str>, max_receives: u32) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM queue_task WHERE receive_count > ? AND (? IS NULL OR queue_name = ?)",
        )
        .bind(i64::from(max_receives))
        .bind(queue_name)
        .bind(queue_name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to purge exhausted tasks", e)
        })?;
        Ok(result.rows_affected())
    }
}
