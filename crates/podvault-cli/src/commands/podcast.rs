//! Podcast subscription commands.

use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use podvault_core::error::AppError;
use podvault_core::traits::FeedSource;
use podvault_database::repositories::PodcastRepository;
use podvault_entity::podcast::CreatePodcast;
use podvault_feed::HttpFeedSource;

/// Arguments for podcast commands
#[derive(Debug, Args)]
pub struct PodcastArgs {
    /// Podcast subcommand
    #[command(subcommand)]
    pub command: PodcastCommand,
}

/// Podcast subcommands
#[derive(Debug, Subcommand)]
pub enum PodcastCommand {
    /// Subscribe to a feed
    Add {
        /// RSS feed URL
        feed_url: String,
    },
    /// List subscriptions
    List,
}

/// Podcast display row
#[derive(Debug, Serialize, Tabled)]
struct PodcastRow {
    /// GUID
    guid: String,
    /// Title
    title: String,
    /// Feed URL
    feed_url: String,
    /// Last Checked
    last_checked: String,
    /// Latest Episode
    last_episode: String,
}

/// Execute podcast commands
pub async fn execute(
    args: &PodcastArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let pool = super::create_db_pool(&config).await?;
    let repo = PodcastRepository::new(pool.clone());

    match &args.command {
        PodcastCommand::Add { feed_url } => {
            let source = HttpFeedSource::new(&config.feeds)?;
            let feed = source.fetch(feed_url).await?;

            let podcast = repo
                .create(
                    &CreatePodcast {
                        guid: feed.guid,
                        title: feed.title,
                        feed_url: feed_url.clone(),
                    },
                    Utc::now(),
                )
                .await?;

            output::print_success(&format!("Subscribed to '{}'", podcast.title));
            output::print_kv("GUID", &podcast.guid);
            output::print_kv("Episodes in feed", &feed.episodes.len().to_string());
        }
        PodcastCommand::List => {
            let rows: Vec<PodcastRow> = repo
                .find_all()
                .await?
                .into_iter()
                .map(|p| PodcastRow {
                    guid: p.guid,
                    title: p.title,
                    feed_url: p.feed_url,
                    last_checked: output::format_time(p.last_checked_at),
                    last_episode: output::format_time(p.last_episode_at),
                })
                .collect();
            output::print_list(&rows, format);
        }
    }

    pool.close().await;
    Ok(())
}
