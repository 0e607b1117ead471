//! Typed payloads for the built-in queues.

use serde::{Deserialize, Serialize};

/// Payload of a `downloadWorker` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadEpisode {
    /// Episode to download.
    pub episode_guid: String,
}
