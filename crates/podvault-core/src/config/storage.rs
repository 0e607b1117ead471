//! Episode storage configuration.

use serde::{Deserialize, Serialize};

/// Where downloaded episode files are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend stores episodes.
    #[serde(default)]
    pub driver: StorageDriver,
    /// Root directory for downloaded episode files (local driver).
    #[serde(default = "default_data_root")]
    pub data_root: String,
    /// S3-compatible object storage settings (s3 driver).
    #[serde(default)]
    pub s3: S3StorageConfig,
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// Files under `data_root`.
    #[default]
    Local,
    /// Objects in an S3-compatible bucket.
    S3,
}

/// S3-compatible object storage configuration.
///
/// Credentials come from the standard AWS environment and profile chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3StorageConfig {
    /// Bucket name. Required when `driver = "s3"`.
    #[serde(default)]
    pub bucket: String,
    /// Key prefix prepended to `podcast_guid/file_name`.
    #[serde(default)]
    pub prefix: String,
    /// Region override. Falls back to the AWS environment.
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint URL for non-AWS services like MinIO.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::local(default_data_root())
    }
}

impl StorageConfig {
    /// Local storage rooted at `data_root`.
    pub fn local(data_root: impl Into<String>) -> Self {
        Self {
            driver: StorageDriver::Local,
            data_root: data_root.into(),
            s3: S3StorageConfig::default(),
        }
    }
}

fn default_data_root() -> String {
    "data/objects".to_string()
}
