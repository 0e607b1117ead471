//! Feed polling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for fetching podcast feeds and episode files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// A podcast checked more recently than this is skipped.
    #[serde(default = "default_min_check_interval")]
    pub min_check_interval_seconds: u64,
    /// Timeout for fetching a feed document.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Timeout for downloading one episode file.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_seconds: u64,
    /// User-Agent header sent to feed and media hosts.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl FeedsConfig {
    /// Minimum check interval as a [`Duration`].
    pub fn min_check_interval(&self) -> Duration {
        Duration::from_secs(self.min_check_interval_seconds)
    }

    /// Feed request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Download timeout as a [`Duration`].
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            min_check_interval_seconds: default_min_check_interval(),
            request_timeout_seconds: default_request_timeout(),
            download_timeout_seconds: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_min_check_interval() -> u64 {
    10 * 60
}

fn default_request_timeout() -> u64 {
    5
}

fn default_download_timeout() -> u64 {
    15 * 60
}

fn default_user_agent() -> String {
    concat!("podvault/", env!("CARGO_PKG_VERSION")).to_string()
}
