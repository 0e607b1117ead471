//! Task queue inspection and repair commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use podvault_core::error::AppError;

/// Arguments for queue commands
#[derive(Debug, Args)]
pub struct QueueArgs {
    /// Queue subcommand
    #[command(subcommand)]
    pub command: QueueCommand,
}

/// Queue subcommands
#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Show pending, leased and exhausted counts
    Stats {
        /// Restrict to one queue
        #[arg(short, long)]
        queue: Option<String>,
    },
    /// List tasks that exceeded the receive limit
    Exhausted {
        /// Restrict to one queue
        #[arg(short, long)]
        queue: Option<String>,
        /// Maximum number of tasks to show
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Give an exhausted task a fresh set of deliveries
    Requeue {
        /// Task ID
        id: i64,
    },
    /// Delete exhausted tasks
    Purge {
        /// Restrict to one queue
        #[arg(short, long)]
        queue: Option<String>,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Enqueue a task by hand
    Push {
        /// Target queue
        queue: String,
        /// JSON payload
        #[arg(short, long, default_value = "null")]
        payload: String,
    },
}

/// Queue counts display row
#[derive(Debug, Serialize, Tabled)]
struct StatsRow {
    /// Queue
    queue: String,
    /// Pending
    pending: i64,
    /// Leased
    leased: i64,
    /// Exhausted
    exhausted: i64,
    /// Total
    total: i64,
}

/// Exhausted task display row
#[derive(Debug, Serialize, Tabled)]
struct TaskRow {
    /// Task ID
    id: i64,
    /// Queue
    queue: String,
    /// Receives
    receives: i64,
    /// Created
    created: String,
    /// Payload
    payload: String,
}

/// Execute queue commands
pub async fn execute(
    args: &QueueArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let pool = super::create_db_pool(&config).await?;
    let queue = super::task_queue(&config, &pool);

    match &args.command {
        QueueCommand::Stats { queue: name } => {
            let stats = queue.stats(name.as_deref()).await?;
            let rows = vec![StatsRow {
                queue: name.clone().unwrap_or_else(|| "*".to_string()),
                pending: stats.pending,
                leased: stats.leased,
                exhausted: stats.exhausted,
                total: stats.total(),
            }];
            output::print_list(&rows, format);
        }
        QueueCommand::Exhausted { queue: name, limit } => {
            let tasks = queue.list_exhausted(name.as_deref(), *limit).await?;
            let rows: Vec<TaskRow> = tasks
                .into_iter()
                .map(|t| TaskRow {
                    id: t.id,
                    queue: t.queue_name,
                    receives: t.receive_count,
                    created: output::format_time(Some(t.created_at)),
                    payload: t.payload.to_string(),
                })
                .collect();
            output::print_list(&rows, format);
        }
        QueueCommand::Requeue { id } => {
            queue.requeue(*id).await?;
            output::print_success(&format!("Task {id} requeued"));
        }
        QueueCommand::Purge { queue: name, force } => {
            if !force {
                let scope = name.as_deref().unwrap_or("all queues");
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!("Delete exhausted tasks in {scope}?"))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let purged = queue.purge_exhausted(name.as_deref()).await?;
            output::print_success(&format!("Purged {purged} exhausted tasks"));
        }
        QueueCommand::Push {
            queue: name,
            payload,
        } => {
            let payload: serde_json::Value = serde_json::from_str(payload)
                .map_err(|e| AppError::validation(format!("Invalid JSON payload: {e}")))?;
            let id = queue.push(name, &payload).await?;
            output::print_success(&format!("Pushed task {id} to '{name}'"));
        }
    }

    pool.close().await;
    Ok(())
}
