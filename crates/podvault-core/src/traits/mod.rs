//! Traits implemented by external collaborators.
//!
//! The background work system calls these capabilities without owning
//! their correctness: fetching and parsing a feed, and saving an episode
//! file somewhere durable.

pub mod feed;
pub mod storage;

pub use feed::{FeedSource, ParsedEpisode, ParsedFeed};
pub use storage::EpisodeStore;
