//! CLI command definitions and dispatch.

pub mod migrate;
pub mod podcast;
pub mod queue;
pub mod schedule;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

use crate::output::OutputFormat;
use podvault_core::config::AppConfig;
use podvault_core::error::AppError;
use podvault_core::types::SystemClock;
use podvault_database::DatabasePool;
use podvault_database::repositories::QueueTaskRepository;
use podvault_worker::TaskQueue;

/// PodVault: podcast archiver administration
#[derive(Debug, Parser)]
#[command(name = "podvault", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Task queue inspection and repair
    Queue(queue::QueueArgs),
    /// Recurring task state
    Schedule(schedule::ScheduleArgs),
    /// Podcast subscriptions
    Podcast(podcast::PodcastArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &self.config).await,
            Commands::Queue(args) => queue::execute(args, &self.config, self.format).await,
            Commands::Schedule(args) => schedule::execute(args, &self.config, self.format).await,
            Commands::Podcast(args) => podcast::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load_file(config_path)
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<SqlitePool, AppError> {
    let pool = DatabasePool::connect(&config.database).await?;
    Ok(pool.into_pool())
}

/// Helper: task queue over `pool` using wall-clock time
pub fn task_queue(config: &AppConfig, pool: &SqlitePool) -> TaskQueue {
    TaskQueue::new(
        Arc::new(QueueTaskRepository::new(pool.clone())),
        config.queue.clone(),
        Arc::new(SystemClock),
    )
}
