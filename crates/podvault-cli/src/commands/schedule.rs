//! Recurring task state commands.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use podvault_core::error::AppError;
use podvault_database::repositories::ScheduledTaskRepository;
use podvault_worker::TaskScheduler;

/// Arguments for schedule commands
#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Schedule subcommand
    #[command(subcommand)]
    pub command: ScheduleCommand,
}

/// Schedule subcommands
#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// List configured tasks with their last run
    List,
}

/// Scheduled task display row
#[derive(Debug, Serialize, Tabled)]
struct ScheduleRow {
    /// Task
    task: String,
    /// Queue
    queue: String,
    /// Interval (s)
    interval_secs: u64,
    /// Last Run
    last_run: String,
    /// Next Due
    next_due: String,
}

/// Execute schedule commands
pub async fn execute(
    args: &ScheduleArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let pool = super::create_db_pool(&config).await?;
    let repo = Arc::new(ScheduledTaskRepository::new(pool.clone()));
    let scheduler = TaskScheduler::from_config(
        Arc::clone(&repo),
        Arc::new(super::task_queue(&config, &pool)),
        &config.scheduler,
    )?;

    match &args.command {
        ScheduleCommand::List => {
            let states = repo.find_all().await?;
            let now = Utc::now();
            let rows: Vec<ScheduleRow> = scheduler
                .tasks()
                .iter()
                .map(|task| {
                    let last_run = states
                        .iter()
                        .find(|s| s.task_name == task.task_name)
                        .map(|s| s.last_run_time);
                    let next_due = match last_run {
                        None => "not provisioned".to_string(),
                        Some(last) if task.is_due(last, now) => "now".to_string(),
                        Some(last) => output::format_time(
                            TimeDelta::from_std(task.interval)
                                .ok()
                                .and_then(|interval| last.checked_add_signed(interval)),
                        ),
                    };
                    ScheduleRow {
                        task: task.task_name.clone(),
                        queue: task.queue_name.clone(),
                        interval_secs: task.interval.as_secs(),
                        last_run: output::format_time(last_run),
                        next_due,
                    }
                })
                .collect();
            output::print_list(&rows, format);
        }
    }

    pool.close().await;
    Ok(())
}
