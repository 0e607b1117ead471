//! Integration tests for the task queue.

mod helpers;

use chrono::TimeDelta;
use serde_json::json;

use podvault_core::config::QueueConfig;
use podvault_core::error::ErrorKind;
use podvault_core::types::Clock;
use podvault_entity::queue::TaskState;

#[tokio::test]
async fn test_failed_task_returns_after_backoff() {
    let app = helpers::TestApp::new().await;
    let id = app.queue.push("feedWorker", &"pod-123").await.unwrap();

    let task = app.queue.pop("feedWorker").await.unwrap();
    assert_eq!(task.id, id);
    assert_eq!(task.receive_count, 1);
    assert_eq!(task.payload, json!("pod-123"));

    let retry_at = app.queue.return_task(&task).await.unwrap();
    assert_eq!(retry_at, app.clock.now() + TimeDelta::seconds(10));

    let err = app.queue.pop("feedWorker").await.unwrap_err();
    assert!(err.is_not_found());

    app.clock.advance(TimeDelta::seconds(10));
    let again = app.queue.pop("feedWorker").await.unwrap();
    assert_eq!(again.id, id);
    assert_eq!(again.receive_count, 2);
}

#[tokio::test]
async fn test_pop_is_fifo_by_creation_time() {
    let app = helpers::TestApp::new().await;
    let first = app.queue.push("downloadWorker", &json!({"n": 1})).await.unwrap();
    app.clock.advance(TimeDelta::milliseconds(5));
    let second = app.queue.push("downloadWorker", &json!({"n": 2})).await.unwrap();

    assert_eq!(app.queue.pop("downloadWorker").await.unwrap().id, first);
    assert_eq!(app.queue.pop("downloadWorker").await.unwrap().id, second);
}

#[tokio::test]
async fn test_same_timestamp_breaks_ties_by_id() {
    let app = helpers::TestApp::new().await;
    let first = app.queue.push("q", &1).await.unwrap();
    let second = app.queue.push("q", &2).await.unwrap();

    assert_eq!(app.queue.pop("q").await.unwrap().id, first);
    assert_eq!(app.queue.pop("q").await.unwrap().id, second);
}

#[tokio::test]
async fn test_queues_are_isolated() {
    let app = helpers::TestApp::new().await;
    app.queue.push("a", &"x").await.unwrap();

    assert!(app.queue.pop("b").await.unwrap_err().is_not_found());
    assert_eq!(app.queue.pop("a").await.unwrap().queue_name, "a");
}

#[tokio::test]
async fn test_leased_task_is_hidden_until_timeout() {
    let app = helpers::TestApp::new().await;
    let id = app.queue.push("q", &"work").await.unwrap();

    app.queue.pop("q").await.unwrap();
    assert!(app.queue.pop("q").await.unwrap_err().is_not_found());

    app.clock
        .advance(TimeDelta::from_std(app.queue_config.visibility_timeout()).unwrap());
    let redelivered = app.queue.pop("q").await.unwrap();
    assert_eq!(redelivered.id, id);
    assert_eq!(redelivered.receive_count, 2);
}

#[tokio::test]
async fn test_complete_deletes_and_is_idempotent() {
    let app = helpers::TestApp::new().await;
    app.queue.push("q", &"work").await.unwrap();

    let task = app.queue.pop("q").await.unwrap();
    app.queue.complete(&task).await.unwrap();
    app.queue.complete(&task).await.unwrap();

    assert_eq!(app.task_count("q").await, 0);
}

#[tokio::test]
async fn test_return_of_completed_task_is_not_found() {
    let app = helpers::TestApp::new().await;
    app.queue.push("q", &"work").await.unwrap();

    let task = app.queue.pop("q").await.unwrap();
    app.queue.complete(&task).await.unwrap();
    assert!(app.queue.return_task(&task).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_push_rejects_empty_queue_name() {
    let app = helpers::TestApp::new().await;
    let err = app.queue.push("  ", &"x").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_push_rejects_oversized_payload() {
    let app = helpers::TestApp::with_queue_config(QueueConfig {
        max_payload_bytes: 16,
        ..QueueConfig::default()
    })
    .await;

    let err = app.queue.push("q", &"x".repeat(64)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(app.task_count("q").await, 0);
}

#[tokio::test]
async fn test_task_is_exhausted_after_max_receives() {
    let app = helpers::TestApp::with_queue_config(QueueConfig {
        max_receives: 2,
        backoff_interval_seconds: 1,
        backoff_exponent: 1,
        ..QueueConfig::default()
    })
    .await;
    let id = app.queue.push("q", &"doomed").await.unwrap();

    // Initial delivery plus max_receives retries.
    for expected in 1..=3 {
        let task = app.queue.pop("q").await.unwrap();
        assert_eq!(task.receive_count, expected);
        app.queue.return_task(&task).await.unwrap();
        app.clock.advance(TimeDelta::seconds(1));
    }

    assert!(app.queue.pop("q").await.unwrap_err().is_not_found());

    let stats = app.queue.stats(Some("q")).await.unwrap();
    assert_eq!(stats.exhausted, 1);
    assert_eq!(stats.pending, 0);

    let exhausted = app.queue.list_exhausted(Some("q"), 10).await.unwrap();
    assert_eq!(exhausted.len(), 1);
    assert_eq!(exhausted[0].id, id);
    assert_eq!(
        exhausted[0].state(app.clock.now(), 2),
        TaskState::Exhausted
    );
    assert_eq!(
        app.queue.exhausted_by_queue().await.unwrap(),
        vec![("q".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_requeue_gives_exhausted_task_fresh_deliveries() {
    let app = helpers::TestApp::with_queue_config(QueueConfig {
        max_receives: 0,
        ..QueueConfig::default()
    })
    .await;
    let id = app.queue.push("q", &"again").await.unwrap();

    let task = app.queue.pop("q").await.unwrap();
    app.queue.return_task(&task).await.unwrap();
    assert_eq!(app.queue.stats(Some("q")).await.unwrap().exhausted, 1);

    app.queue.requeue(id).await.unwrap();
    let task = app.queue.pop("q").await.unwrap();
    assert_eq!(task.id, id);
    assert_eq!(task.receive_count, 1);

    assert!(app.queue.requeue(9999).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_requeue_refuses_leased_and_pending_tasks() {
    let app = helpers::TestApp::new().await;
    let leased = app.queue.push("q", &"busy").await.unwrap();
    app.queue.pop("q").await.unwrap();

    let err = app.queue.requeue(leased).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    // The active lease still hides the task from other consumers.
    assert!(app.queue.pop("q").await.unwrap_err().is_not_found());

    let pending = app.queue.push("q", &"waiting").await.unwrap();
    let err = app.queue.requeue(pending).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let task = app.queue.pop("q").await.unwrap();
    assert_eq!(task.id, pending);
    assert_eq!(task.receive_count, 1);
}

#[tokio::test]
async fn test_purge_removes_only_exhausted_tasks() {
    let app = helpers::TestApp::with_queue_config(QueueConfig {
        max_receives: 0,
        ..QueueConfig::default()
    })
    .await;
    app.queue.push("q", &"exhaust me").await.unwrap();
    let task = app.queue.pop("q").await.unwrap();
    app.queue.return_task(&task).await.unwrap();
    app.queue.push("q", &"keep me").await.unwrap();

    assert_eq!(app.queue.purge_exhausted(Some("q")).await.unwrap(), 1);

    let stats = app.queue.stats(Some("q")).await.unwrap();
    assert_eq!(stats.exhausted, 0);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.total(), 1);
}

#[tokio::test]
async fn test_stats_across_queues() {
    let app = helpers::TestApp::new().await;
    app.queue.push("a", &1).await.unwrap();
    app.queue.push("a", &2).await.unwrap();
    app.queue.push("b", &3).await.unwrap();
    app.queue.pop("a").await.unwrap();

    let all = app.queue.stats(None).await.unwrap();
    assert_eq!(all.pending, 2);
    assert_eq!(all.leased, 1);

    let a = app.queue.stats(Some("a")).await.unwrap();
    assert_eq!(a.pending, 1);
    assert_eq!(a.leased, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pops_never_share_a_lease() {
    let app = helpers::TestApp::new().await;
    for n in 0..20 {
        app.queue.push("q", &n).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = app.queue.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            loop {
                match queue.pop("q").await {
                    Ok(task) => ids.push(task.id),
                    Err(e) if e.is_not_found() => break,
                    Err(e) => panic!("pop failed: {e}"),
                }
            }
            ids
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    all.sort_unstable();
    let before = all.len();
    all.dedup();
    assert_eq!(before, 20);
    assert_eq!(all.len(), 20);
}

#[tokio::test]
async fn test_retry_delays_grow_geometrically() {
    let app = helpers::TestApp::new().await;
    let id = app.queue.push("q", &"flaky").await.unwrap();

    let mut previous_delay = TimeDelta::zero();
    let mut previous_visible = app.clock.now();
    for attempt in 1..=5_i64 {
        let task = app.queue.pop("q").await.unwrap();
        assert_eq!(task.receive_count, attempt);

        let now = app.clock.now();
        let retry_at = app.queue.return_task(&task).await.unwrap();
        let stored: i64 =
            sqlx::query_scalar("SELECT visible_after FROM queue_task WHERE id = ?")
                .bind(id)
                .fetch_one(&app.pool)
                .await
                .unwrap();
        assert_eq!(stored, retry_at.timestamp_millis());
        assert!(retry_at > previous_visible);

        let delay = retry_at - now;
        if attempt == 1 {
            assert_eq!(delay, TimeDelta::seconds(10));
        } else {
            assert_eq!(delay, previous_delay * 2);
        }

        previous_delay = delay;
        previous_visible = retry_at;
        app.clock.set(retry_at);
    }
}
