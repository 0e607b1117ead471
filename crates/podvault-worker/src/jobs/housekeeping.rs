//! Housekeeping handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use podvault_database::repositories::EpisodeRepository;

use crate::queue::TaskQueue;
use crate::registry::{HandlerError, TaskContext, TaskHandler};

/// Reports exhausted tasks and episode totals.
///
/// Exhausted tasks are never redelivered, so this is where they surface
/// for an operator.
#[derive(Debug)]
pub struct HousekeepingHandler {
    queue: Arc<TaskQueue>,
    episodes: Arc<EpisodeRepository>,
}

impl HousekeepingHandler {
    /// Create a new housekeeping handler
    pub fn new(queue: Arc<TaskQueue>, episodes: Arc<EpisodeRepository>) -> Self {
        Self { queue, episodes }
    }
}

#[async_trait]
impl TaskHandler for HousekeepingHandler {
    async fn handle(&self, _ctx: &TaskContext, _payload: &Value) -> Result<(), HandlerError> {
        tracing::info!("Running housekeeping");

        for (queue_name, count) in self.queue.exhausted_by_queue().await? {
            tracing::warn!(
                queue = %queue_name,
                exhausted = count,
                "Queue has exhausted tasks that will not be retried"
            );
        }

        for (status, count) in self.episodes.count_by_status().await? {
            tracing::info!(status = %status, count, "Episode totals");
        }

        Ok(())
    }
}
