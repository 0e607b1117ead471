//! Durable background work for PodVault.
//!
//! This crate provides:
//! - A task queue over the `queue_task` table with visibility-timeout
//!   leases, receive counting and exponential backoff
//! - A recurring scheduler that enqueues each configured task once per
//!   interval, coordinated across instances through the database
//! - Worker loops that pop a queue and dispatch to registered handlers
//! - Built-in handlers for feed polling, episode downloads and housekeeping

pub mod jobs;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod scheduler;

pub use queue::TaskQueue;
pub use registry::{HandlerError, HandlerRegistry, TaskContext, TaskHandler};
pub use runner::{PollOutcome, QueueWorker, WorkerRunner};
pub use scheduler::{TaskScheduler, TickOutcome, TickSummary};
