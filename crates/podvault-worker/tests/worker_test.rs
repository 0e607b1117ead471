//! Integration tests for worker loops and the built-in handlers.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::TimeDelta;
use serde_json::{Value, json};
use tokio::sync::watch;

use podvault_core::config::{FeedsConfig, QueueConfig, WorkerConfig};
use podvault_core::traits::ParsedFeed;
use podvault_core::types::Clock;
use podvault_entity::podcast::{CreatePodcast, EpisodeStatus};
use podvault_entity::queue::{DownloadEpisode, QueueTask};
use podvault_worker::jobs::{
    DOWNLOAD_WORKER_QUEUE, DownloadHandler, FEED_WORKER_QUEUE, FeedPollHandler,
    HousekeepingHandler,
};
use podvault_worker::registry::FnHandler;
use podvault_worker::{
    HandlerError, HandlerRegistry, PollOutcome, QueueWorker, TaskContext, TaskHandler,
    WorkerRunner,
};

const FEED_URL: &str = "https://feeds.example.com/show.xml";

fn worker(app: &helpers::TestApp, queue: &str, handler: Arc<dyn TaskHandler>) -> QueueWorker {
    QueueWorker::new(Arc::clone(&app.queue), queue, handler, &WorkerConfig::default())
        .with_idle_sleep(Duration::from_millis(10))
}

async fn subscribe(app: &helpers::TestApp) {
    app.podcast_repo()
        .create(
            &CreatePodcast {
                guid: "show".to_string(),
                title: "The Show".to_string(),
                feed_url: FEED_URL.to_string(),
            },
            app.clock.now(),
        )
        .await
        .unwrap();
}

fn feed_poll_handler(
    app: &helpers::TestApp,
    source: Arc<helpers::FakeFeedSource>,
) -> FeedPollHandler {
    FeedPollHandler::new(
        app.pool.clone(),
        app.podcast_repo(),
        Arc::clone(&app.queue),
        source,
        &FeedsConfig::default(),
    )
}

fn context(app: &helpers::TestApp, receive_count: i64) -> TaskContext {
    let task = QueueTask {
        id: 1,
        queue_name: "test".to_string(),
        created_at: app.clock.now(),
        visible_after: app.clock.now(),
        receive_count,
        payload: Value::Null,
    };
    let (_tx, rx) = watch::channel(false);
    TaskContext::new(&task, app.queue_config.max_receives, rx)
}

#[tokio::test]
async fn test_successful_handler_completes_task() {
    let app = helpers::TestApp::new().await;
    let id = app.queue.push("q", &json!({"n": 1})).await.unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let handler = Arc::new(FnHandler::new(move |_ctx, payload| {
        let counter = Arc::clone(&counter);
        async move {
            assert_eq!(payload, json!({"n": 1}));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }));

    let (_tx, rx) = watch::channel(false);
    let outcome = worker(&app, "q", handler).process_next(&rx).await;

    assert_eq!(outcome, PollOutcome::Completed { task_id: id });
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(app.task_count("q").await, 0);
}

#[tokio::test]
async fn test_failing_handler_returns_task_with_backoff() {
    let app = helpers::TestApp::new().await;
    let id = app.queue.push("q", &"boom").await.unwrap();
    let handler = Arc::new(FnHandler::new(|_ctx, _payload| async {
        Err(HandlerError::Failed("boom".to_string()))
    }));

    let (_tx, rx) = watch::channel(false);
    let worker = worker(&app, "q", handler);
    let outcome = worker.process_next(&rx).await;

    assert_eq!(
        outcome,
        PollOutcome::Failed {
            task_id: id,
            retry_at: Some(app.clock.now() + TimeDelta::seconds(10)),
        }
    );
    assert_eq!(worker.process_next(&rx).await, PollOutcome::Idle);
    assert_eq!(app.task_count("q").await, 1);
}

#[tokio::test]
async fn test_empty_queue_is_idle() {
    let app = helpers::TestApp::new().await;
    let handler = Arc::new(FnHandler::new(|_ctx, _payload| async { Ok(()) }));
    let (_tx, rx) = watch::channel(false);

    let outcome = worker(&app, "q", handler).process_next(&rx).await;
    assert_eq!(outcome, PollOutcome::Idle);
    assert!(outcome.should_sleep());
}

#[tokio::test]
async fn test_closed_store_reports_store_error() {
    let app = helpers::TestApp::new().await;
    let handler = Arc::new(FnHandler::new(|_ctx, _payload| async { Ok(()) }));
    let worker = worker(&app, "q", handler);
    let (_tx, rx) = watch::channel(false);

    app.pool.close().await;
    let outcome = worker.process_next(&rx).await;
    assert_eq!(outcome, PollOutcome::StoreError);
    assert!(outcome.should_sleep());
}

#[tokio::test]
async fn test_handler_sees_last_attempt() {
    let app = helpers::TestApp::with_queue_config(QueueConfig {
        max_receives: 0,
        ..QueueConfig::default()
    })
    .await;
    app.queue.push("q", &"once").await.unwrap();

    let last = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&last);
    let handler = Arc::new(FnHandler::new(move |ctx, _payload| {
        let flag = Arc::clone(&flag);
        async move {
            if ctx.is_last_attempt() {
                flag.fetch_add(1, Ordering::SeqCst);
            }
            Err(HandlerError::Failed("nope".to_string()))
        }
    }));

    let (_tx, rx) = watch::channel(false);
    worker(&app, "q", handler).process_next(&rx).await;
    assert_eq!(last.load(Ordering::SeqCst), 1);
    assert_eq!(app.queue.stats(Some("q")).await.unwrap().exhausted, 1);
}

#[tokio::test]
async fn test_runner_drains_queue_and_stops_on_cancel() {
    let app = helpers::TestApp::new().await;
    for n in 0..5 {
        app.queue.push("q", &n).await.unwrap();
    }

    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let mut registry = HandlerRegistry::new();
    registry.register_fn("q", move |_ctx, _payload| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let runner = WorkerRunner::new(
        Arc::clone(&app.queue),
        Arc::new(registry),
        WorkerConfig {
            concurrency: 2,
            idle_sleep_seconds: 0,
            shutdown_timeout_seconds: 5,
            ..WorkerConfig::default()
        },
    );
    assert_eq!(runner.workers().len(), 2);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move { runner.run(rx).await });

    for _ in 0..200 {
        if done.load(Ordering::SeqCst) == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(done.load(Ordering::SeqCst), 5);
    assert_eq!(app.task_count("q").await, 0);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("runner did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_feed_poll_records_new_episodes_and_queues_downloads() {
    let app = helpers::TestApp::new().await;
    subscribe(&app).await;

    let published = app.clock.now() - TimeDelta::days(1);
    let source = Arc::new(helpers::FakeFeedSource::default());
    source.set_feed(
        FEED_URL,
        ParsedFeed {
            guid: "show".to_string(),
            title: "The Show".to_string(),
            episodes: vec![
                helpers::parsed_episode("ep-1", published - TimeDelta::days(7)),
                helpers::parsed_episode("ep-2", published),
            ],
        },
    );
    let handler = feed_poll_handler(&app, Arc::clone(&source));

    handler.handle(&context(&app, 1), &Value::Null).await.unwrap();

    assert_eq!(app.task_count(DOWNLOAD_WORKER_QUEUE).await, 2);
    let episodes = app.episode_repo().find_by_podcast("show").await.unwrap();
    assert_eq!(episodes.len(), 2);
    assert!(episodes.iter().all(|e| e.status == EpisodeStatus::Pending));

    let podcast = app.podcast_repo().find_by_guid("show").await.unwrap().unwrap();
    assert_eq!(podcast.last_checked_at, Some(app.clock.now()));
    assert_eq!(podcast.last_episode_at, Some(published));

    // Checked too recently: no fetch at all.
    handler.handle(&context(&app, 1), &Value::Null).await.unwrap();
    assert_eq!(source.fetches().len(), 1);

    // Known episodes are not queued twice.
    app.clock.advance(TimeDelta::hours(1));
    handler.handle(&context(&app, 1), &Value::Null).await.unwrap();
    assert_eq!(source.fetches().len(), 2);
    assert_eq!(app.task_count(DOWNLOAD_WORKER_QUEUE).await, 2);

    let payload: DownloadEpisode = serde_json::from_value(
        app.queue.pop(DOWNLOAD_WORKER_QUEUE).await.unwrap().payload,
    )
    .unwrap();
    assert_eq!(payload.episode_guid, "ep-1");
}

#[tokio::test]
async fn test_feed_poll_failure_fails_task() {
    let app = helpers::TestApp::new().await;
    subscribe(&app).await;
    app.queue.push(FEED_WORKER_QUEUE, &Value::Null).await.unwrap();

    let source = Arc::new(helpers::FakeFeedSource::default());
    let handler: Arc<dyn TaskHandler> = Arc::new(feed_poll_handler(&app, source));

    let (_tx, rx) = watch::channel(false);
    let outcome = worker(&app, FEED_WORKER_QUEUE, handler).process_next(&rx).await;

    assert!(matches!(outcome, PollOutcome::Failed { .. }));
    let podcast = app.podcast_repo().find_by_guid("show").await.unwrap().unwrap();
    assert!(podcast.last_checked_at.is_none());
}

async fn seed_episode(app: &helpers::TestApp) {
    subscribe(app).await;
    let source = Arc::new(helpers::FakeFeedSource::default());
    source.set_feed(
        FEED_URL,
        ParsedFeed {
            guid: "show".to_string(),
            title: "The Show".to_string(),
            episodes: vec![helpers::parsed_episode("ep-1", app.clock.now())],
        },
    );
    feed_poll_handler(app, source)
        .handle(&context(app, 1), &Value::Null)
        .await
        .unwrap();
}

fn download_handler(app: &helpers::TestApp, store: Arc<helpers::FakeStore>) -> DownloadHandler {
    DownloadHandler::new(app.episode_repo(), store, Arc::new(app.clock.clone()))
}

#[tokio::test]
async fn test_download_stores_file_and_marks_success() {
    let app = helpers::TestApp::new().await;
    seed_episode(&app).await;
    let store = Arc::new(helpers::FakeStore::default());
    let handler = download_handler(&app, Arc::clone(&store));
    let payload = json!({"episode_guid": "ep-1"});

    handler.handle(&context(&app, 1), &payload).await.unwrap();

    assert_eq!(
        store.saved(),
        vec![(
            "https://cdn.example.com/ep-1.mp3".to_string(),
            "show".to_string(),
            "ep-1.mp3".to_string(),
        )]
    );
    let episode = app.episode_repo().find_by_guid("ep-1").await.unwrap().unwrap();
    assert_eq!(episode.status, EpisodeStatus::Success);
    assert_eq!(episode.size_bytes, Some(2048));

    // Redelivery after success does not download again.
    handler.handle(&context(&app, 2), &payload).await.unwrap();
    assert_eq!(store.saved().len(), 1);
}

#[tokio::test]
async fn test_download_failure_marks_episode_failed_on_last_attempt() {
    let app = helpers::TestApp::new().await;
    seed_episode(&app).await;
    let store = Arc::new(helpers::FakeStore::default());
    store.set_failing(true);
    let handler = download_handler(&app, store);
    let payload = json!({"episode_guid": "ep-1"});

    assert!(handler.handle(&context(&app, 1), &payload).await.is_err());
    let episode = app.episode_repo().find_by_guid("ep-1").await.unwrap().unwrap();
    assert_eq!(episode.status, EpisodeStatus::Pending);

    let last = i64::from(app.queue_config.max_receives) + 1;
    assert!(handler.handle(&context(&app, last), &payload).await.is_err());
    let episode = app.episode_repo().find_by_guid("ep-1").await.unwrap().unwrap();
    assert_eq!(episode.status, EpisodeStatus::Failed);
}

#[tokio::test]
async fn test_download_of_unknown_episode_is_dropped() {
    let app = helpers::TestApp::new().await;
    let store = Arc::new(helpers::FakeStore::default());
    let handler = download_handler(&app, Arc::clone(&store));

    handler
        .handle(&context(&app, 1), &json!({"episode_guid": "gone"}))
        .await
        .unwrap();
    assert!(store.saved().is_empty());

    let err = handler
        .handle(&context(&app, 1), &json!("not an object"))
        .await
        .unwrap_err();
    assert!(matches!(err, HandlerError::Failed(_)));
}

#[tokio::test]
async fn test_housekeeping_succeeds() {
    let app = helpers::TestApp::new().await;
    seed_episode(&app).await;
    let handler = HousekeepingHandler::new(Arc::clone(&app.queue), app.episode_repo());

    handler.handle(&context(&app, 1), &Value::Null).await.unwrap();
}
