//! Built-in task handler implementations.

pub mod download;
pub mod feed;
pub mod housekeeping;

pub use download::DownloadHandler;
pub use feed::FeedPollHandler;
pub use housekeeping::HousekeepingHandler;

/// Queue polled by [`FeedPollHandler`].
pub const FEED_WORKER_QUEUE: &str = "feedWorker";
/// Queue consumed by [`DownloadHandler`].
pub const DOWNLOAD_WORKER_QUEUE: &str = "downloadWorker";
/// Queue consumed by [`HousekeepingHandler`].
pub const HOUSEKEEPING_QUEUE: &str = "houseKeeping";
