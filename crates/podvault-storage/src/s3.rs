//! S3-compatible object storage episode store.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use reqwest::header::CONTENT_TYPE;
use tokio::fs;
use tracing::{debug, info};

use podvault_core::config::{FeedsConfig, StorageConfig};
use podvault_core::error::{AppError, ErrorKind};
use podvault_core::result::AppResult;
use podvault_core::traits::EpisodeStore;
use podvault_feed::http::{build_client, external_error, validate_external_url};

use crate::local::{checked_segment, copy_stream};

/// Stores episodes as `<prefix><podcast_guid>/<file_name>` objects in a bucket.
///
/// Downloads are spooled to a temporary file first so the upload has a known
/// length and a failed download never leaves a partial object behind.
#[derive(Debug, Clone)]
pub struct S3EpisodeStore {
    client: Client,
    bucket: String,
    prefix: String,
    http: reqwest::Client,
}

impl S3EpisodeStore {
    /// Build a client from the AWS environment plus `storage.s3` overrides.
    pub async fn new(storage: &StorageConfig, feeds: &FeedsConfig) -> AppResult<Self> {
        let s3 = &storage.s3;
        if s3.bucket.trim().is_empty() {
            return Err(AppError::configuration("storage.s3.bucket must be set"));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &s3.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &s3.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let client_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(s3.force_path_style)
            .build();

        info!(
            bucket = %s3.bucket,
            prefix = %s3.prefix,
            endpoint = ?s3.endpoint,
            "Initializing S3 episode store"
        );

        Ok(Self {
            client: Client::from_conf(client_config),
            bucket: s3.bucket.clone(),
            prefix: s3.prefix.clone(),
            http: build_client(feeds.download_timeout(), &feeds.user_agent)?,
        })
    }

    fn key(&self, podcast_guid: &str, file_name: &str) -> AppResult<String> {
        object_key(&self.prefix, podcast_guid, file_name)
    }
}

#[async_trait]
impl EpisodeStore for S3EpisodeStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn save_remote(
        &self,
        source_url: &str,
        podcast_guid: &str,
        file_name: &str,
    ) -> AppResult<u64> {
        let url = validate_external_url(source_url)?;
        let key = self.key(podcast_guid, file_name)?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| external_error("Failed to download", source_url, e))?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let spool = tempfile::NamedTempFile::new().map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to create spool file", e)
        })?;
        let handle = spool.as_file().try_clone().map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to open spool file", e)
        })?;
        let mut file = fs::File::from_std(handle);
        let total_bytes = copy_stream(&mut file, response.bytes_stream()).await?;
        drop(file);

        let body = ByteStream::from_path(spool.path()).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read spool file", e)
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .set_content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                AppError::new(
                    ErrorKind::Storage,
                    format!(
                        "Failed to upload s3://{}/{key}: {}",
                        self.bucket,
                        DisplayErrorContext(&e)
                    ),
                )
            })?;

        debug!(bucket = %self.bucket, key = %key, bytes = total_bytes, "Uploaded episode object");
        Ok(total_bytes)
    }

    async fn exists(&self, podcast_guid: &str, file_name: &str) -> AppResult<bool> {
        let key = self.key(podcast_guid, file_name)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(AppError::new(
                ErrorKind::Storage,
                format!(
                    "Failed to stat s3://{}/{key}: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ),
            )),
        }
    }
}

/// `prefix + podcast_guid/file_name`, with both segments checked.
pub(crate) fn object_key(prefix: &str, podcast_guid: &str, file_name: &str) -> AppResult<String> {
    Ok(format!(
        "{prefix}{}/{}",
        checked_segment(podcast_guid)?,
        checked_segment(file_name)?
    ))
}
