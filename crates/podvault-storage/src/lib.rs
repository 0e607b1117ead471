//! # podvault-storage
//!
//! Storage for downloaded episode media. Episodes are addressed as
//! `<podcast_guid>/<file_name>`, below `data_root` for the local driver or
//! below the configured key prefix for the S3 driver.

pub mod local;
pub mod s3;

use std::sync::Arc;

use podvault_core::config::{FeedsConfig, StorageConfig, StorageDriver};
use podvault_core::result::AppResult;
use podvault_core::traits::EpisodeStore;

pub use local::LocalEpisodeStore;
pub use s3::S3EpisodeStore;

/// Build the episode store selected by `storage.driver`.
pub async fn build_store(
    storage: &StorageConfig,
    feeds: &FeedsConfig,
) -> AppResult<Arc<dyn EpisodeStore>> {
    let store: Arc<dyn EpisodeStore> = match storage.driver {
        StorageDriver::Local => Arc::new(LocalEpisodeStore::new(storage, feeds).await?),
        StorageDriver::S3 => Arc::new(S3EpisodeStore::new(storage, feeds).await?),
    };
    tracing::info!(provider = store.provider_type(), "Episode store ready");
    Ok(store)
}
