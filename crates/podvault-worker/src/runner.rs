//! Worker loops: pop a queue, dispatch to its handler, complete or return.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use podvault_core::config::WorkerConfig;

use crate::queue::TaskQueue;
use crate::registry::{HandlerRegistry, TaskContext, TaskHandler};

/// Result of one worker iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No eligible task.
    Idle,
    /// The store failed while popping.
    StoreError,
    /// The handler succeeded and the task was completed.
    Completed {
        /// Id of the processed task
        task_id: i64,
    },
    /// The handler failed and the task was handed back.
    Failed {
        /// Id of the processed task
        task_id: i64,
        /// When the task becomes visible again, if the return succeeded
        retry_at: Option<DateTime<Utc>>,
    },
}

impl PollOutcome {
    /// Whether the loop should sleep before the next iteration.
    pub fn should_sleep(&self) -> bool {
        matches!(self, Self::Idle | Self::StoreError)
    }
}

/// A single consumer loop for one queue.
#[derive(Debug, Clone)]
pub struct QueueWorker {
    /// Task queue to pop from
    queue: Arc<TaskQueue>,
    /// Queue this loop consumes
    queue_name: String,
    /// Handler for every task of the queue
    handler: Arc<dyn TaskHandler>,
    /// Sleep after an empty pop or a store error
    idle_sleep: Duration,
    /// Identifier used in logs
    worker_id: String,
}

impl QueueWorker {
    /// Create a worker loop for `queue_name`
    pub fn new(
        queue: Arc<TaskQueue>,
        queue_name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
        config: &WorkerConfig,
    ) -> Self {
        let queue_name = queue_name.into();
        Self {
            worker_id: format!("{queue_name}-0"),
            queue,
            queue_name,
            handler,
            idle_sleep: config.idle_sleep(),
        }
    }

    /// Set the identifier used in logs
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Override the idle sleep
    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Queue this loop consumes
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Run until the cancel signal is received.
    ///
    /// Cancellation is checked between iterations; a handler that is
    /// already running is allowed to finish.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            worker = %self.worker_id,
            queue = %self.queue_name,
            idle_sleep_secs = self.idle_sleep.as_secs(),
            "Worker started"
        );

        loop {
            if *cancel.borrow() {
                break;
            }

            let outcome = self.process_next(&cancel).await;
            if !outcome.should_sleep() {
                continue;
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = time::sleep(self.idle_sleep) => {}
            }
        }

        tracing::info!(worker = %self.worker_id, queue = %self.queue_name, "Worker stopped");
    }

    /// Pop one task and process it.
    pub async fn process_next(&self, cancel: &watch::Receiver<bool>) -> PollOutcome {
        let task = match self.queue.pop(&self.queue_name).await {
            Ok(task) => task,
            Err(e) if e.is_not_found() => {
                tracing::trace!(queue = %self.queue_name, "No tasks available");
                return PollOutcome::Idle;
            }
            Err(e) => {
                tracing::error!(queue = %self.queue_name, error = %e, "Failed to pop task");
                return PollOutcome::StoreError;
            }
        };

        let ctx = TaskContext::new(&task, self.queue.config().max_receives, cancel.clone());
        tracing::debug!(
            worker = %self.worker_id,
            queue = %self.queue_name,
            task_id = task.id,
            receive_count = task.receive_count,
            "Processing task"
        );

        match self.handler.handle(&ctx, &task.payload).await {
            Ok(()) => {
                if let Err(e) = self.queue.complete(&task).await {
                    tracing::warn!(
                        queue = %self.queue_name,
                        task_id = task.id,
                        error = %e,
                        "Failed to complete task; it will be redelivered after its lease"
                    );
                }
                tracing::info!(
                    queue = %self.queue_name,
                    task_id = task.id,
                    receive_count = task.receive_count,
                    "Task completed"
                );
                PollOutcome::Completed { task_id: task.id }
            }
            Err(err) => {
                tracing::error!(
                    queue = %self.queue_name,
                    task_id = task.id,
                    receive_count = task.receive_count,
                    last_attempt = ctx.is_last_attempt(),
                    error = %err,
                    "Task handler failed"
                );
                let retry_at = match self.queue.return_task(&task).await {
                    Ok(at) => Some(at),
                    Err(e) => {
                        tracing::warn!(
                            queue = %self.queue_name,
                            task_id = task.id,
                            error = %e,
                            "Failed to return task"
                        );
                        None
                    }
                };
                PollOutcome::Failed {
                    task_id: task.id,
                    retry_at,
                }
            }
        }
    }
}

/// Runs `concurrency` worker loops for every registered queue.
#[derive(Debug)]
pub struct WorkerRunner {
    /// Task queue shared by all loops
    queue: Arc<TaskQueue>,
    /// Handlers by queue name
    registry: Arc<HandlerRegistry>,
    /// Worker configuration
    config: WorkerConfig,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(queue: Arc<TaskQueue>, registry: Arc<HandlerRegistry>, config: WorkerConfig) -> Self {
        Self {
            queue,
            registry,
            config,
        }
    }

    /// Build the worker loops without starting them.
    pub fn workers(&self) -> Vec<QueueWorker> {
        let mut workers = Vec::new();
        for queue_name in self.registry.queue_names() {
            let Some(handler) = self.registry.get(&queue_name) else {
                continue;
            };
            for n in 0..self.config.concurrency {
                workers.push(
                    QueueWorker::new(
                        Arc::clone(&self.queue),
                        queue_name.clone(),
                        Arc::clone(&handler),
                        &self.config,
                    )
                    .with_worker_id(format!("{queue_name}-{n}")),
                );
            }
        }
        workers
    }

    /// Spawn every worker loop onto the runtime.
    pub fn spawn(&self, cancel: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.workers()
            .into_iter()
            .map(|worker| {
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            })
            .collect()
    }

    /// Run all loops until cancelled, then wait up to the shutdown timeout
    /// for in-flight handlers before aborting the rest.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let mut handles = self.spawn(cancel.clone());
        tracing::info!(
            loops = handles.len(),
            queues = ?self.registry.queue_names(),
            concurrency = self.config.concurrency,
            "Worker runner started"
        );

        while !*cancel.borrow() {
            if cancel.changed().await.is_err() {
                break;
            }
        }

        tracing::info!("Worker runner waiting for in-flight tasks to complete...");
        let joined = time::timeout(
            self.config.shutdown_timeout(),
            futures::future::join_all(handles.iter_mut()),
        )
        .await;

        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Worker loop ended abnormally");
                    }
                }
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.shutdown_timeout_seconds,
                    "Shutdown timed out; aborting remaining worker loops"
                );
                for handle in &handles {
                    handle.abort();
                }
            }
        }

        tracing::info!("Worker runner shut down complete");
    }
}
