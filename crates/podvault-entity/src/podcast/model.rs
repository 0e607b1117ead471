//! Podcast entity model.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::timestamp;

/// A subscribed podcast feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    /// Stable podcast identifier.
    pub guid: String,
    /// Podcast title.
    pub title: String,
    /// RSS feed URL.
    pub feed_url: String,
    /// When the feed was last fetched.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Publication time of the newest known episode.
    pub last_episode_at: Option<DateTime<Utc>>,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

impl Podcast {
    /// Whether the feed was fetched recently enough to be skipped.
    pub fn checked_within(&self, window: TimeDelta, now: DateTime<Utc>) -> bool {
        self.last_checked_at
            .is_some_and(|checked| {
                checked
                    .checked_add_signed(window)
                    .is_none_or(|until| until > now)
            })
    }
}

impl<'r> FromRow<'r, SqliteRow> for Podcast {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            guid: row.try_get("guid")?,
            title: row.try_get("title")?,
            feed_url: row.try_get("feed_url")?,
            last_checked_at: timestamp::from_millis_opt(row.try_get("last_checked_at")?)?,
            last_episode_at: timestamp::from_millis_opt(row.try_get("last_episode_at")?)?,
            created_at: timestamp::from_millis(row.try_get("created_at")?)?,
        })
    }
}

/// Data required to subscribe to a podcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePodcast {
    /// Stable podcast identifier.
    pub guid: String,
    /// Podcast title.
    pub title: String,
    /// RSS feed URL.
    pub feed_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_within() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut podcast = Podcast {
            guid: "p1".to_string(),
            title: "Show".to_string(),
            feed_url: "https://example.com/feed.xml".to_string(),
            last_checked_at: None,
            last_episode_at: None,
            created_at: now,
        };
        assert!(!podcast.checked_within(TimeDelta::minutes(10), now));

        podcast.last_checked_at = Some(now - TimeDelta::minutes(5));
        assert!(podcast.checked_within(TimeDelta::minutes(10), now));

        podcast.last_checked_at = Some(now - TimeDelta::minutes(10));
        assert!(!podcast.checked_within(TimeDelta::minutes(10), now));
    }
}
