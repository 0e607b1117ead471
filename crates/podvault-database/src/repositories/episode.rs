//! Episode repository implementation.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_entity::podcast::{Episode, EpisodeStatus, NewEpisode};
use podvault_entity::timestamp::to_millis;

const EPISODE_COLUMNS: &str = "guid, podcast_guid, title, description, download_url, mime_type, \
     size_bytes, duration_secs, published_at, status, created_at, updated_at";

/// Repository for podcast episodes.
#[derive(Debug, Clone)]
pub struct EpisodeRepository {
    pool: SqlitePool,
}

impl EpisodeRepository {
    /// Create a new episode repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an episode as `pending` unless its guid is already known.
    /// Returns `true` when the episode is new.
    pub async fn insert_if_absent<'e, E>(
        executor: E,
        data: &NewEpisode,
        now: DateTime<Utc>,
    ) -> AppResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = to_millis(now);
        let result = sqlx::query(
            "INSERT INTO episode (guid, podcast_guid, title, description, download_url, mime_type, \
             size_bytes, duration_secs, published_at, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (guid) DO NOTHING",
        )
        .bind(&data.guid)
        .bind(&data.podcast_guid)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.download_url)
        .bind(&data.mime_type)
        .bind(data.size_bytes)
        .bind(data.duration_secs)
        .bind(to_millis(data.published_at))
        .bind(EpisodeStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(executor)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert episode", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// Find an episode by guid.
    pub async fn find_by_guid(&self, guid: &str) -> AppResult<Option<Episode>> {
        sqlx::query_as::<_, Episode>(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episode WHERE guid = ?"
        ))
        .bind(guid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find episode", e))
    }

    /// List a podcast's episodes, newest first.
    pub async fn find_by_podcast(&self, podcast_guid: &str) -> AppResult<Vec<Episode>> {
        sqlx::query_as::<_, Episode>(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episode WHERE podcast_guid = ? \
             ORDER BY published_at DESC, guid"
        ))
        .bind(podcast_guid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list episodes", e))
    }

    /// Mark an episode as stored, recording the size actually written.
    pub async fn mark_success(
        &self,
        guid: &str,
        size_bytes: i64,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE episode SET status = ?, size_bytes = ?, updated_at = ? WHERE guid = ?",
        )
        .bind(EpisodeStatus::Success)
        .bind(size_bytes)
        .bind(to_millis(now))
        .bind(guid)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update episode", e))?;
        Ok(())
    }

    /// Set an episode's status.
    pub async fn set_status(
        &self,
        guid: &str,
        status: EpisodeStatus,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE episode SET status = ?, updated_at = ? WHERE guid = ?")
            .bind(status)
            .bind(to_millis(now))
            .bind(guid)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update episode", e)
            })?;
        Ok(())
    }

    /// Number of episodes per status.
    pub async fn count_by_status(&self) -> AppResult<Vec<(EpisodeStatus, i64)>> {
        sqlx::query_as::<_, (EpisodeStatus, i64)>(
            "SELECT status, COUNT(*) FROM episode GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count episodes", e))
    }
}
