//! Repository implementations for all PodVault entities.

pub mod episode;
pub mod podcast;
pub mod queue_task;
pub mod scheduled_task;

pub use episode::EpisodeRepository;
pub use podcast::PodcastRepository;
pub use queue_task::QueueTaskRepository;
pub use scheduled_task::ScheduledTaskRepository;
