//! Handler registry: maps queue names to task handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::watch;

use podvault_core::error::AppError;
use podvault_entity::queue::QueueTask;

/// Error returned by a task handler. Either variant sends the task back
/// to the queue with backoff.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The work itself failed (bad input, remote failure, ...)
    #[error("Task failed: {0}")]
    Failed(String),

    /// An infrastructure error surfaced while doing the work
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// What a handler knows about the delivery it is processing.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Id of the leased task
    pub task_id: i64,
    /// Queue the task was popped from
    pub queue_name: String,
    /// Deliveries so far, including this one
    pub receive_count: i64,
    /// Receive limit of the queue
    pub max_receives: u32,
    cancel: watch::Receiver<bool>,
}

impl TaskContext {
    /// Build the context for a freshly popped task.
    pub fn new(task: &QueueTask, max_receives: u32, cancel: watch::Receiver<bool>) -> Self {
        Self {
            task_id: task.id,
            queue_name: task.queue_name.clone(),
            receive_count: task.receive_count,
            max_receives,
            cancel,
        }
    }

    /// Whether a failure now leaves the task exhausted.
    pub fn is_last_attempt(&self) -> bool {
        self.receive_count > i64::from(self.max_receives)
    }

    /// Whether shutdown has been requested. Long handlers may stop early.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Trait for task handler implementations
#[async_trait]
pub trait TaskHandler: Send + Sync + std::fmt::Debug {
    /// Process one delivery of a task's payload
    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> Result<(), HandlerError>;
}

type HandlerFn = dyn Fn(TaskContext, Value) -> BoxFuture<'static, Result<(), HandlerError>>
    + Send
    + Sync;

/// A [`TaskHandler`] backed by an async closure.
pub struct FnHandler {
    f: Box<HandlerFn>,
}

impl FnHandler {
    /// Wrap an async closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(TaskContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            f: Box::new(move |ctx, payload| f(ctx, payload).boxed()),
        }
    }
}

impl std::fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl TaskHandler for FnHandler {
    async fn handle(&self, ctx: &TaskContext, payload: &Value) -> Result<(), HandlerError> {
        (self.f)(ctx.clone(), payload.clone()).await
    }
}

/// Registered handlers by queue name
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a queue, replacing any previous one
    pub fn register(&mut self, queue_name: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let queue_name = queue_name.into();
        tracing::info!(queue = %queue_name, "Registered task handler");
        self.handlers.insert(queue_name, handler);
    }

    /// Register an async closure as the handler for a queue
    pub fn register_fn<F, Fut>(&mut self, queue_name: impl Into<String>, f: F)
    where
        F: Fn(TaskContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(queue_name, Arc::new(FnHandler::new(f)));
    }

    /// Handler for a queue, if any
    pub fn get(&self, queue_name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(queue_name).cloned()
    }

    /// Registered queue names, sorted
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
