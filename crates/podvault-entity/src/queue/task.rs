//! Queue task entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::state::TaskState;
use crate::timestamp;

/// A unit of deferred work stored in the `queue_task` table.
///
/// There is no status column: whether a task is pending, leased or
/// exhausted is derived from `visible_after` and `receive_count`
/// (see [`QueueTask::state`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueTask {
    /// Server-assigned, strictly increasing identifier.
    pub id: i64,
    /// Queue the task belongs to.
    pub queue_name: String,
    /// Creation time; FIFO order within a queue.
    pub created_at: DateTime<Utc>,
    /// The task may only be leased once `now >= visible_after`.
    pub visible_after: DateTime<Utc>,
    /// Number of times the task has been leased.
    pub receive_count: i64,
    /// Opaque payload handed verbatim to the handler.
    pub payload: serde_json::Value,
}

impl QueueTask {
    /// Derive the logical state of this task at `now`.
    pub fn state(&self, now: DateTime<Utc>, max_receives: u32) -> TaskState {
        if self.receive_count > i64::from(max_receives) {
            TaskState::Exhausted
        } else if self.visible_after <= now {
            TaskState::Pending
        } else {
            TaskState::Leased
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for QueueTask {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let payload: String = row.try_get("payload")?;
        let payload = serde_json::from_str(&payload).map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Self {
            id: row.try_get("id")?,
            queue_name: row.try_get("queue_name")?,
            created_at: timestamp::from_millis(row.try_get("created_at")?)?,
            visible_after: timestamp::from_millis(row.try_get("visible_after")?)?,
            receive_count: row.try_get("receive_count")?,
            payload,
        })
    }
}
