//! Task queue and recurring schedule entities.

pub mod payload;
pub mod scheduled;
pub mod state;
pub mod task;

pub use payload::DownloadEpisode;
pub use scheduled::{ScheduledTaskDefinition, ScheduledTaskState};
pub use state::{QueueStats, TaskState};
pub use task::QueueTask;
