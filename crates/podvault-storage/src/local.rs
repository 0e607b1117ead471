//! Local filesystem episode store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use podvault_core::config::{FeedsConfig, StorageConfig};
use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_core::traits::EpisodeStore;
use podvault_feed::http::{build_client, external_error, validate_external_url};

/// Stores episodes under a root directory, downloading them with `reqwest`.
#[derive(Debug, Clone)]
pub struct LocalEpisodeStore {
    /// Root directory for all stored files.
    root: PathBuf,
    client: reqwest::Client,
}

impl LocalEpisodeStore {
    /// Create a store rooted at `storage.data_root`.
    pub async fn new(storage: &StorageConfig, feeds: &FeedsConfig) -> AppResult<Self> {
        let root = PathBuf::from(&storage.data_root);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            client: build_client(feeds.download_timeout(), &feeds.user_agent)?,
        })
    }

    /// Resolve `podcast_guid/file_name` below the root.
    fn resolve(&self, podcast_guid: &str, file_name: &str) -> AppResult<PathBuf> {
        Ok(self
            .root
            .join(checked_segment(podcast_guid)?)
            .join(checked_segment(file_name)?))
    }

    /// Write a byte stream to `podcast_guid/file_name`.
    ///
    /// Data goes to a `.part` file first and is renamed into place once
    /// complete, so a reader never sees a half-written episode and a
    /// repeated save simply replaces the previous file.
    pub async fn write_stream<S, E>(
        &self,
        podcast_guid: &str,
        file_name: &str,
        stream: S,
    ) -> AppResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let full_path = self.resolve(podcast_guid, file_name)?;
        ensure_parent(&full_path).await?;
        let part_path = full_path.with_extension(match full_path.extension() {
            Some(ext) => format!("{}.part", ext.to_string_lossy()),
            None => "part".to_string(),
        });

        let mut file = fs::File::create(&part_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create file: {}", part_path.display()),
                e,
            )
        })?;

        let total_bytes = match copy_stream(&mut file, stream).await {
            Ok(total_bytes) => total_bytes,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&part_path).await;
                return Err(e);
            }
        };
        drop(file);

        fs::rename(&part_path, &full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to move file into place: {}", full_path.display()),
                e,
            )
        })?;

        debug!(path = %full_path.display(), bytes = total_bytes, "Wrote episode file");
        Ok(total_bytes)
    }
}

#[async_trait]
impl EpisodeStore for LocalEpisodeStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn save_remote(
        &self,
        source_url: &str,
        podcast_guid: &str,
        file_name: &str,
    ) -> AppResult<u64> {
        let url = validate_external_url(source_url)?;
        // Fail on a bad target path before spending a download on it.
        self.resolve(podcast_guid, file_name)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| external_error("Failed to download", source_url, e))?;

        self.write_stream(podcast_guid, file_name, response.bytes_stream())
            .await
    }

    async fn exists(&self, podcast_guid: &str, file_name: &str) -> AppResult<bool> {
        let path = self.resolve(podcast_guid, file_name)?;
        fs::try_exists(&path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to stat file: {}", path.display()),
                e,
            )
        })
    }
}

/// Copy a download stream into `file` and flush it. Returns the byte count.
pub(crate) async fn copy_stream<S, E>(file: &mut fs::File, stream: S) -> AppResult<u64>
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut stream = std::pin::pin!(stream);
    let mut total_bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            AppError::with_source(ErrorKind::ExternalService, "Download stream failed", e)
        })?;
        total_bytes += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush file", e))?;
    Ok(total_bytes)
}

/// A single path component: no separators, no `.`/`..`, not empty.
pub(crate) fn checked_segment(segment: &str) -> AppResult<&str> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0'])
    {
        return Err(AppError::validation(format!(
            "Invalid storage path segment: '{segment}'"
        )));
    }
    Ok(segment)
}

async fn ensure_parent(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create parent directory: {}", parent.display()),
                e,
            )
        })?;
    }
    Ok(())
}
