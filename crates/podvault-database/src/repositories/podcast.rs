//! Podcast repository implementation.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_entity::podcast::{CreatePodcast, Podcast};
use podvault_entity::timestamp::to_millis;

const PODCAST_COLUMNS: &str =
    "guid, title, feed_url, last_checked_at, last_episode_at, created_at";

/// Repository for podcast subscriptions.
#[derive(Debug, Clone)]
pub struct PodcastRepository {
    pool: SqlitePool,
}

impl PodcastRepository {
    /// Create a new podcast repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Subscribe to a podcast.
    pub async fn create(&self, data: &CreatePodcast, now: DateTime<Utc>) -> AppResult<Podcast> {
        sqlx::query_as::<_, Podcast>(&format!(
            "INSERT INTO podcast (guid, title, feed_url, created_at) VALUES (?, ?, ?, ?) \
             RETURNING {PODCAST_COLUMNS}"
        ))
        .bind(&data.guid)
        .bind(&data.title)
        .bind(&data.feed_url)
        .bind(to_millis(now))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::with_source(
                ErrorKind::Conflict,
                format!("Podcast '{}' already exists", data.feed_url),
                e,
            ),
            _ => AppError::with_source(ErrorKind::Database, "Failed to create podcast", e),
        })
    }

    /// List all podcasts, least recently checked first.
    pub async fn find_all(&self) -> AppResult<Vec<Podcast>> {
        sqlx::query_as::<_, Podcast>(&format!(
            "SELECT {PODCAST_COLUMNS} FROM podcast ORDER BY COALESCE(last_checked_at, 0), guid"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list podcasts", e))
    }

    /// Find a podcast by guid.
    pub async fn find_by_guid(&self, guid: &str) -> AppResult<Option<Podcast>> {
        sqlx::query_as::<_, Podcast>(&format!(
            "SELECT {PODCAST_COLUMNS} FROM podcast WHERE guid = ?"
        ))
        .bind(guid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find podcast", e))
    }

    /// Record a feed check. `last_episode_at` only moves forward.
    pub async fn update_check_times(
        &self,
        guid: &str,
        checked_at: DateTime<Utc>,
        last_episode_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let last_episode_at = last_episode_at.map(to_millis);
        sqlx::query(
            "UPDATE podcast SET last_checked_at = ?, \
             last_episode_at = CASE \
                WHEN ? IS NULL THEN last_episode_at \
                WHEN last_episode_at IS NULL OR last_episode_at < ? THEN ? \
                ELSE last_episode_at END \
             WHERE guid = ?",
        )
        .bind(to_millis(checked_at))
        .bind(last_episode_at)
        .bind(last_episode_at)
        .bind(last_episode_at)
        .bind(guid)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update podcast", e))?;
        Ok(())
    }
}
