//! Podcast and episode domain entities.

pub mod episode;
pub mod model;
pub mod status;

pub use episode::{Episode, MEDIA_TYPES, NewEpisode, extension_for, mime_for_extension};
pub use model::{CreatePodcast, Podcast};
pub use status::EpisodeStatus;
