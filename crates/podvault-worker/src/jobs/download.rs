//! Episode download handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use podvault_core::traits::EpisodeStore;
use podvault_core::types::Clock;
use podvault_database::repositories::EpisodeRepository;
use podvault_entity::podcast::EpisodeStatus;
use podvault_entity::queue::DownloadEpisode;

use crate::registry::{HandlerError, TaskContext, TaskHandler};

/// Downloads one episode's media into the [`EpisodeStore`].
///
/// Redelivery is harmless: an episode already marked `success` is skipped
/// and the store overwrites partial files.
#[derive(Debug)]
pub struct DownloadHandler {
    episodes: Arc<EpisodeRepository>,
    store: Arc<dyn EpisodeStore>,
    clock: Arc<dyn Clock>,
}

impl DownloadHandler {
    /// Create a new download handler
    pub fn new(
        episodes: Arc<EpisodeRepository>,
        store: Arc<dyn EpisodeStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            episodes,
            store,
            clock,
        }
    }
}

#[async_trait]
impl TaskHandler for DownloadHandler {
    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> Result<(), HandlerError> {
        let request: DownloadEpisode = serde_json::from_value(payload.clone())
            .map_err(|e| HandlerError::Failed(format!("Invalid download payload: {e}")))?;

        let Some(episode) = self.episodes.find_by_guid(&request.episode_guid).await? else {
            tracing::warn!(episode = %request.episode_guid, "Episode no longer exists, dropping download");
            return Ok(());
        };
        if episode.status == EpisodeStatus::Success {
            tracing::debug!(episode = %episode.guid, "Episode already downloaded");
            return Ok(());
        }

        let file_name = episode.file_name();
        match self
            .store
            .save_remote(&episode.download_url, &episode.podcast_guid, &file_name)
            .await
        {
            Ok(bytes) => {
                let size = i64::try_from(bytes).unwrap_or(i64::MAX);
                self.episodes
                    .mark_success(&episode.guid, size, self.clock.now())
                    .await?;
                tracing::info!(
                    episode = %episode.guid,
                    podcast = %episode.podcast_guid,
                    bytes,
                    provider = self.store.provider_type(),
                    "Downloaded episode"
                );
                Ok(())
            }
            Err(e) => {
                if ctx.is_last_attempt() {
                    self.episodes
                        .set_status(&episode.guid, EpisodeStatus::Failed, self.clock.now())
                        .await?;
                    tracing::warn!(episode = %episode.guid, "Giving up on episode download");
                }
                Err(HandlerError::Internal(e))
            }
        }
    }
}
