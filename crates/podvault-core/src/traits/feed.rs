//! Feed source trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// A podcast feed as understood by the feed poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFeed {
    /// Stable identifier of the podcast.
    pub guid: String,
    /// Podcast title.
    pub title: String,
    /// Episodes found in the feed, in document order.
    pub episodes: Vec<ParsedEpisode>,
}

/// One downloadable episode found in a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEpisode {
    /// Stable identifier of the episode.
    pub guid: String,
    /// Episode title.
    pub title: String,
    /// Episode description (may be empty).
    pub description: String,
    /// Enclosure URL of the media file.
    pub download_url: String,
    /// Enclosure MIME type.
    pub mime_type: String,
    /// Declared enclosure length, if any.
    pub size_bytes: Option<i64>,
    /// Declared duration in seconds, if any.
    pub duration_secs: Option<i64>,
    /// Publication time.
    pub published_at: DateTime<Utc>,
}

/// Fetches and parses podcast feeds.
#[async_trait]
pub trait FeedSource: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch the feed at `feed_url` and return its podcast and episodes.
    ///
    /// Individual malformed items are skipped by implementations; an error
    /// means the feed as a whole could not be read.
    async fn fetch(&self, feed_url: &str) -> AppResult<ParsedFeed>;
}
