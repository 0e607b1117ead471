//! Episode entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::status::EpisodeStatus;
use crate::timestamp;

/// Supported enclosure MIME types and their stored file extensions. The
/// first entry for an extension is its canonical MIME type.
pub const MEDIA_TYPES: &[(&str, &str)] = &[
    ("audio/mpeg", "mp3"),
    ("audio/mp3", "mp3"),
    ("audio/x-m4a", "m4a"),
    ("audio/mp4", "m4a"),
    ("video/mp4", "mp4"),
    ("video/quicktime", "mov"),
];

/// One episode of a podcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Stable episode identifier.
    pub guid: String,
    /// Owning podcast.
    pub podcast_guid: String,
    /// Episode title.
    pub title: String,
    /// Episode description.
    pub description: String,
    /// Media URL.
    pub download_url: String,
    /// Media MIME type.
    pub mime_type: String,
    /// Declared media size.
    pub size_bytes: Option<i64>,
    /// Declared duration.
    pub duration_secs: Option<i64>,
    /// Publication time.
    pub published_at: DateTime<Utc>,
    /// Download status.
    pub status: EpisodeStatus,
    /// When the episode was discovered.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

impl Episode {
    /// Name of the stored media file: the sanitized guid plus an extension
    /// derived from the MIME type.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .guid
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        match extension_for(&self.mime_type) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }
}

/// File extension for a supported media MIME type.
pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    let mime = mime_type.split(';').next().unwrap_or_default().trim();
    MEDIA_TYPES
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
}

/// Canonical MIME type for a supported file extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    MEDIA_TYPES
        .iter()
        .find(|(_, e)| e.eq_ignore_ascii_case(ext))
        .map(|(mime, _)| *mime)
}

impl<'r> FromRow<'r, SqliteRow> for Episode {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            guid: row.try_get("guid")?,
            podcast_guid: row.try_get("podcast_guid")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            download_url: row.try_get("download_url")?,
            mime_type: row.try_get("mime_type")?,
            size_bytes: row.try_get("size_bytes")?,
            duration_secs: row.try_get("duration_secs")?,
            published_at: timestamp::from_millis(row.try_get("published_at")?)?,
            status: row.try_get("status")?,
            created_at: timestamp::from_millis(row.try_get("created_at")?)?,
            updated_at: timestamp::from_millis(row.try_get("updated_at")?)?,
        })
    }
}

/// Data required to record a newly discovered episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEpisode {
    /// Stable episode identifier.
    pub guid: String,
    /// Owning podcast.
    pub podcast_guid: String,
    /// Episode title.
    pub title: String,
    /// Episode description.
    pub description: String,
    /// Media URL.
    pub download_url: String,
    /// Media MIME type.
    pub mime_type: String,
    /// Declared media size.
    pub size_bytes: Option<i64>,
    /// Declared duration.
    pub duration_secs: Option<i64>,
    /// Publication time.
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(guid: &str, mime: &str) -> Episode {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Episode {
            guid: guid.to_string(),
            podcast_guid: "p1".to_string(),
            title: "Ep".to_string(),
            description: String::new(),
            download_url: "https://example.com/ep.mp3".to_string(),
            mime_type: mime.to_string(),
            size_bytes: None,
            duration_secs: None,
            published_at: now,
            status: EpisodeStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_file_name_uses_mime_extension() {
        assert_eq!(episode("ep-1", "audio/mpeg").file_name(), "ep-1.mp3");
        assert_eq!(episode("ep-1", "audio/x-m4a").file_name(), "ep-1.m4a");
        assert_eq!(episode("ep-1", "video/quicktime").file_name(), "ep-1.mov");
        assert_eq!(episode("ep-1", "application/pdf").file_name(), "ep-1");
    }

    #[test]
    fn test_file_name_sanitizes_guid() {
        assert_eq!(
            episode("https://x.io/a b", "audio/mpeg").file_name(),
            "https___x_io_a_b.mp3"
        );
    }

    #[test]
    fn test_extension_ignores_parameters() {
        assert_eq!(extension_for("audio/mpeg; charset=binary"), Some("mp3"));
    }
}
