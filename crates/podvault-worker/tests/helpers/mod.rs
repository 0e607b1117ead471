//! Shared test helpers for worker integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tempfile::TempDir;

use podvault_core::config::QueueConfig;
use podvault_core::error::AppError;
use podvault_core::result::AppResult;
use podvault_core::traits::{EpisodeStore, FeedSource, ParsedEpisode, ParsedFeed};
use podvault_core::types::ManualClock;
use podvault_database::repositories::{
    EpisodeRepository, PodcastRepository, QueueTaskRepository, ScheduledTaskRepository,
};
use podvault_worker::TaskQueue;

/// Test application context backed by a file database in a temp dir.
pub struct TestApp {
    /// Pool shared by every repository
    pub pool: SqlitePool,
    /// Clock driving the queue and scheduler
    pub clock: ManualClock,
    /// Queue under test
    pub queue: Arc<TaskQueue>,
    /// Queue settings the queue was built with
    pub queue_config: QueueConfig,
    _dir: TempDir,
}

impl TestApp {
    /// Create an app with default queue settings
    pub async fn new() -> Self {
        Self::with_queue_config(QueueConfig::default()).await
    }

    /// Create an app with custom queue settings
    pub async fn with_queue_config(queue_config: QueueConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let options = SqliteConnectOptions::from_str(&url)
            .expect("Invalid test database URL")
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .expect("Failed to connect to test database");

        podvault_database::migration::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let clock = ManualClock::new(start_time());
        let queue = Arc::new(TaskQueue::new(
            Arc::new(QueueTaskRepository::new(pool.clone())),
            queue_config.clone(),
            Arc::new(clock.clone()),
        ));

        Self {
            pool,
            clock,
            queue,
            queue_config,
            _dir: dir,
        }
    }

    pub fn scheduled_repo(&self) -> Arc<ScheduledTaskRepository> {
        Arc::new(ScheduledTaskRepository::new(self.pool.clone()))
    }

    pub fn podcast_repo(&self) -> Arc<PodcastRepository> {
        Arc::new(PodcastRepository::new(self.pool.clone()))
    }

    pub fn episode_repo(&self) -> Arc<EpisodeRepository> {
        Arc::new(EpisodeRepository::new(self.pool.clone()))
    }

    /// Number of rows in `queue_task` for `queue_name`
    pub async fn task_count(&self, queue_name: &str) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM queue_task WHERE queue_name = ?")
            .bind(queue_name)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count tasks")
    }
}

/// Fixed starting instant for every test clock
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid start time")
}

/// Build a parsed episode with sensible defaults
pub fn parsed_episode(guid: &str, published_at: DateTime<Utc>) -> ParsedEpisode {
    ParsedEpisode {
        guid: guid.to_string(),
        title: format!("Episode {guid}"),
        description: String::new(),
        download_url: format!("https://cdn.example.com/{guid}.mp3"),
        mime_type: "audio/mpeg".to_string(),
        size_bytes: Some(1024),
        duration_secs: Some(60),
        published_at,
    }
}

/// Feed source serving canned feeds by URL
#[derive(Debug, Default)]
pub struct FakeFeedSource {
    feeds: Mutex<HashMap<String, ParsedFeed>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeFeedSource {
    pub fn set_feed(&self, url: &str, feed: ParsedFeed) {
        self.feeds
            .lock()
            .expect("feeds lock")
            .insert(url.to_string(), feed);
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().expect("fetches lock").clone()
    }
}

#[async_trait]
impl FeedSource for FakeFeedSource {
    async fn fetch(&self, feed_url: &str) -> AppResult<ParsedFeed> {
        self.fetches
            .lock()
            .expect("fetches lock")
            .push(feed_url.to_string());
        self.feeds
            .lock()
            .expect("feeds lock")
            .get(feed_url)
            .cloned()
            .ok_or_else(|| AppError::external(format!("GET {feed_url} failed")))
    }
}

/// Episode store that records saves and can be told to fail
#[derive(Debug, Default)]
pub struct FakeStore {
    saved: Mutex<Vec<(String, String, String)>>,
    fail: Mutex<bool>,
}

impl FakeStore {
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().expect("fail lock") = fail;
    }

    /// `(source_url, podcast_guid, file_name)` of every successful save
    pub fn saved(&self) -> Vec<(String, String, String)> {
        self.saved.lock().expect("saved lock").clone()
    }
}

#[async_trait]
impl EpisodeStore for FakeStore {
    fn provider_type(&self) -> &str {
        "fake"
    }

    async fn save_remote(
        &self,
        source_url: &str,
        podcast_guid: &str,
        file_name: &str,
    ) -> AppResult<u64> {
        if *self.fail.lock().expect("fail lock") {
            return Err(AppError::external(format!("GET {source_url} failed")));
        }
        self.saved.lock().expect("saved lock").push((
            source_url.to_string(),
            podcast_guid.to_string(),
            file_name.to_string(),
        ));
        Ok(2048)
    }

    async fn exists(&self, podcast_guid: &str, file_name: &str) -> AppResult<bool> {
        Ok(self
            .saved
            .lock()
            .expect("saved lock")
            .iter()
            .any(|(_, p, f)| p == podcast_guid && f == file_name))
    }
}
