//! Feed polling handler.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use serde_json::Value;
use sqlx::SqlitePool;

use podvault_core::config::FeedsConfig;
use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_core::traits::FeedSource;
use podvault_database::repositories::{EpisodeRepository, PodcastRepository};
use podvault_entity::podcast::{NewEpisode, Podcast};
use podvault_entity::queue::DownloadEpisode;

use super::DOWNLOAD_WORKER_QUEUE;
use crate::queue::TaskQueue;
use crate::registry::{HandlerError, TaskContext, TaskHandler};

/// Polls every subscribed feed and records new episodes.
///
/// New episodes are inserted as `pending` and a `downloadWorker` task is
/// pushed for each, in one transaction per podcast.
#[derive(Debug)]
pub struct FeedPollHandler {
    /// Pool used for the per-podcast transaction
    pool: SqlitePool,
    /// Podcast subscriptions
    podcasts: Arc<PodcastRepository>,
    /// Queue download tasks are pushed to
    queue: Arc<TaskQueue>,
    /// Feed fetcher
    source: Arc<dyn FeedSource>,
    /// Podcasts checked more recently than this are skipped
    min_check_interval: TimeDelta,
}

impl FeedPollHandler {
    /// Create a new feed poll handler
    pub fn new(
        pool: SqlitePool,
        podcasts: Arc<PodcastRepository>,
        queue: Arc<TaskQueue>,
        source: Arc<dyn FeedSource>,
        config: &FeedsConfig,
    ) -> Self {
        Self {
            pool,
            podcasts,
            queue,
            source,
            min_check_interval: TimeDelta::from_std(config.min_check_interval())
                .unwrap_or(TimeDelta::MAX),
        }
    }

    /// Fetch one podcast's feed and record what is new. Returns the number
    /// of new episodes.
    pub async fn process_podcast(&self, podcast: &Podcast) -> AppResult<usize> {
        let feed = self.source.fetch(&podcast.feed_url).await?;
        let now = self.queue.clock().now();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let mut added = 0;
        for episode in &feed.episodes {
            let new = NewEpisode {
                guid: episode.guid.clone(),
                podcast_guid: podcast.guid.clone(),
                title: episode.title.clone(),
                description: episode.description.clone(),
                download_url: episode.download_url.clone(),
                mime_type: episode.mime_type.clone(),
                size_bytes: episode.size_bytes,
                duration_secs: episode.duration_secs,
                published_at: episode.published_at,
            };
            if EpisodeRepository::insert_if_absent(&mut *tx, &new, now).await? {
                let payload = DownloadEpisode {
                    episode_guid: new.guid,
                };
                self.queue
                    .push_with(&mut tx, DOWNLOAD_WORKER_QUEUE, &payload)
                    .await?;
                added += 1;
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit new episodes", e)
        })?;

        let last_episode_at = feed.episodes.iter().map(|e| e.published_at).max();
        self.podcasts
            .update_check_times(&podcast.guid, now, last_episode_at)
            .await?;

        Ok(added)
    }
}

#[async_trait]
impl TaskHandler for FeedPollHandler {
    async fn handle(&self, ctx: &TaskContext, _payload: &Value) -> Result<(), HandlerError> {
        let podcasts = self.podcasts.find_all().await?;
        let now = self.queue.clock().now();

        let mut failures = Vec::new();
        for podcast in &podcasts {
            if ctx.is_cancelled() {
                tracing::info!("Feed poll interrupted by shutdown");
                break;
            }
            if podcast.checked_within(self.min_check_interval, now) {
                tracing::debug!(podcast = %podcast.guid, "Podcast checked too recently, skipping");
                continue;
            }

            match self.process_podcast(podcast).await {
                Ok(added) => {
                    tracing::info!(podcast = %podcast.guid, new_episodes = added, "Checked feed");
                }
                Err(e) => {
                    tracing::error!(podcast = %podcast.guid, error = %e, "Failed to check feed");
                    failures.push(format!("{}: {}", podcast.guid, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HandlerError::Failed(format!(
                "{} podcast(s) failed: {}",
                failures.len(),
                failures.join("; ")
            )))
        }
    }
}
