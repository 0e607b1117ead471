//! PodVault Server: podcast archiver background service
//!
//! Main entry point that wires all crates together: the recurring
//! scheduler enqueues marker tasks and the worker loops drain the queues.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use podvault_core::config::AppConfig;
use podvault_core::error::AppError;
use podvault_core::types::{Clock, SystemClock};
use podvault_database::DatabasePool;
use podvault_database::repositories::{
    EpisodeRepository, PodcastRepository, QueueTaskRepository, ScheduledTaskRepository,
};
use podvault_feed::HttpFeedSource;
use podvault_worker::jobs::{
    DOWNLOAD_WORKER_QUEUE, DownloadHandler, FEED_WORKER_QUEUE, FeedPollHandler,
    HOUSEKEEPING_QUEUE, HousekeepingHandler,
};
use podvault_worker::{HandlerRegistry, TaskQueue, TaskScheduler, WorkerRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("PODVAULT_CONFIG") {
        Ok(path) => AppConfig::load_file(path),
        Err(_) => {
            let env = std::env::var("PODVAULT_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting PodVault v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database ─────────────────────────────────────────
    let db = DatabasePool::connect(&config.database).await?;
    podvault_database::migration::run_migrations(db.pool()).await?;
    let pool = db.pool().clone();

    // ── Step 2: Queue and repositories ───────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = Arc::new(TaskQueue::new(
        Arc::new(QueueTaskRepository::new(pool.clone())),
        config.queue.clone(),
        Arc::clone(&clock),
    ));
    let podcast_repo = Arc::new(PodcastRepository::new(pool.clone()));
    let episode_repo = Arc::new(EpisodeRepository::new(pool.clone()));
    let scheduled_repo = Arc::new(ScheduledTaskRepository::new(pool.clone()));

    // ── Step 3: Collaborators ────────────────────────────────────
    let feed_source = Arc::new(HttpFeedSource::new(&config.feeds)?);
    let episode_store = podvault_storage::build_store(&config.storage, &config.feeds).await?;

    // ── Step 4: Handlers ─────────────────────────────────────────
    let mut registry = HandlerRegistry::new();
    registry.register(
        FEED_WORKER_QUEUE,
        Arc::new(FeedPollHandler::new(
            pool.clone(),
            Arc::clone(&podcast_repo),
            Arc::clone(&queue),
            feed_source,
            &config.feeds,
        )),
    );
    registry.register(
        DOWNLOAD_WORKER_QUEUE,
        Arc::new(DownloadHandler::new(
            Arc::clone(&episode_repo),
            episode_store,
            Arc::clone(&clock),
        )),
    );
    registry.register(
        HOUSEKEEPING_QUEUE,
        Arc::new(HousekeepingHandler::new(
            Arc::clone(&queue),
            Arc::clone(&episode_repo),
        )),
    );
    let registry = Arc::new(registry);

    // ── Step 5: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 6: Scheduler ────────────────────────────────────────
    let scheduler_handle = if config.scheduler.enabled {
        let scheduler =
            TaskScheduler::from_config(scheduled_repo, Arc::clone(&queue), &config.scheduler)?;
        for task in scheduler.tasks() {
            if registry.get(&task.queue_name).is_none() {
                tracing::warn!(
                    task_name = %task.task_name,
                    queue = %task.queue_name,
                    "Scheduled task targets a queue with no handler"
                );
            }
        }
        scheduler.setup_state().await?;

        let cancel = shutdown_rx.clone();
        Some(tokio::spawn(async move { scheduler.run(cancel).await }))
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    // ── Step 7: Worker loops ─────────────────────────────────────
    let worker_handle = if config.worker.enabled {
        let runner = WorkerRunner::new(Arc::clone(&queue), registry, config.worker.clone());
        let cancel = shutdown_rx.clone();
        Some(tokio::spawn(async move { runner.run(cancel).await }))
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── Step 8: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
    }
    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker runner ended abnormally");
        }
    }

    db.close().await;
    tracing::info!("PodVault shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
