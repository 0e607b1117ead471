//! HTTP-backed [`FeedSource`].

use async_trait::async_trait;
use tracing::{debug, warn};

use podvault_core::config::FeedsConfig;
use podvault_core::result::AppResult;
use podvault_core::traits::{FeedSource, ParsedFeed};

use crate::http::{build_client, external_error, validate_external_url};
use crate::parser::parse_feed;

/// Fetches feeds with `reqwest` and parses them with [`parse_feed`].
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    /// Create a feed source using the configured timeout and user agent.
    pub fn new(config: &FeedsConfig) -> AppResult<Self> {
        Ok(Self {
            client: build_client(config.request_timeout(), &config.user_agent)?,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, feed_url: &str) -> AppResult<ParsedFeed> {
        let url = validate_external_url(feed_url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| external_error("Failed to fetch feed", feed_url, e))?;
        let body = response
            .text()
            .await
            .map_err(|e| external_error("Failed to read feed", feed_url, e))?;

        let outcome = parse_feed(&body, feed_url)?;
        for reason in &outcome.skipped {
            warn!(feed_url, reason = %reason, "Skipped feed item");
        }
        debug!(
            feed_url,
            episodes = outcome.feed.episodes.len(),
            "Parsed feed"
        );
        Ok(outcome.feed)
    }
}
