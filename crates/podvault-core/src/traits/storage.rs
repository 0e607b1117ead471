//! Episode storage trait.

use async_trait::async_trait;

use crate::result::AppResult;

/// Durable storage for downloaded episode files.
///
/// Saves may be repeated for the same episode (the queue delivers at least
/// once), so implementations must overwrite rather than append.
#[async_trait]
pub trait EpisodeStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g. "local").
    fn provider_type(&self) -> &str;

    /// Download `source_url` and store it as `podcast_guid/file_name`.
    /// Returns the number of bytes written.
    async fn save_remote(
        &self,
        source_url: &str,
        podcast_guid: &str,
        file_name: &str,
    ) -> AppResult<u64>;

    /// Whether `podcast_guid/file_name` is already stored.
    async fn exists(&self, podcast_guid: &str, file_name: &str) -> AppResult<bool>;
}
