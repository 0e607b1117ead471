//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! TOML files plus `PODVAULT__`-prefixed environment variables. Each
//! sub-module represents a logical configuration section. Every section has
//! defaults, so an empty configuration is valid.

pub mod database;
pub mod feeds;
pub mod logging;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod worker;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::feeds::FeedsConfig;
pub use self::logging::LoggingConfig;
pub use self::queue::QueueConfig;
pub use self::scheduler::{ScheduledTaskConfig, SchedulerConfig};
pub use self::storage::{S3StorageConfig, StorageConfig, StorageDriver};
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Maximum length of a recurring task name.
pub const MAX_TASK_NAME_LEN: usize = 100;

/// Root application configuration.
///
/// Passed explicitly into constructors; nothing reads configuration from
/// global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Task queue lease and retry settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Recurring task scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Worker loop settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Feed polling settings.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// Episode storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration for the named environment.
    ///
    /// Merges `config/default.toml`, an environment-specific overlay
    /// `config/{env}.toml` and environment variables prefixed with
    /// `PODVAULT__` (sections separated by `__`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(Self::env_source())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        Self::finish(config)
    }

    /// Load configuration from an explicit file, still honouring
    /// environment variable overrides.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(Self::env_source())
            .build()
            .map_err(|e| {
                AppError::configuration(format!(
                    "Failed to build config from '{}': {e}",
                    path.display()
                ))
            })?;

        Self::finish(config)
    }

    fn env_source() -> config::Environment {
        config::Environment::with_prefix("PODVAULT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn finish(config: config::Config) -> Result<Self, AppError> {
        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        app.validate()?;
        Ok(app)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.queue.max_receives == 0 {
            return Err(AppError::configuration("queue.max_receives must be at least 1"));
        }
        if self.queue.backoff_exponent == 0 {
            return Err(AppError::configuration(
                "queue.backoff_exponent must be at least 1",
            ));
        }
        if self.queue.visibility_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "queue.visibility_timeout_seconds must be positive",
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration("worker.concurrency must be at least 1"));
        }
        if self.scheduler.poll_interval_seconds == 0 {
            return Err(AppError::configuration(
                "scheduler.poll_interval_seconds must be positive",
            ));
        }

        if self.storage.driver == StorageDriver::S3 && self.storage.s3.bucket.trim().is_empty() {
            return Err(AppError::configuration(
                "storage.s3.bucket is required when storage.driver = \"s3\"",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for task in &self.scheduler.tasks {
            let name = task.task_name.trim();
            if name.is_empty() || task.task_name.len() > MAX_TASK_NAME_LEN {
                return Err(AppError::configuration(format!(
                    "scheduler task name '{}' must be 1..={MAX_TASK_NAME_LEN} characters",
                    task.task_name
                )));
            }
            if task.interval_seconds == 0 {
                return Err(AppError::configuration(format!(
                    "scheduler task '{}' must have a positive interval",
                    task.task_name
                )));
            }
            if !seen.insert(task.task_name.as_str()) {
                return Err(AppError::configuration(format!(
                    "scheduler task '{}' is configured twice",
                    task.task_name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.max_receives, 5);
        assert_eq!(config.queue.visibility_timeout_seconds, 30 * 60);
        assert_eq!(config.scheduler.poll_interval_seconds, 60);
        assert_eq!(config.scheduler.tasks.len(), 2);
    }

    #[test]
    fn test_rejects_long_task_name() {
        let mut config = AppConfig::default();
        config.scheduler.tasks.push(ScheduledTaskConfig {
            task_name: "x".repeat(MAX_TASK_NAME_LEN + 1),
            queue: None,
            interval_seconds: 60,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_task_names() {
        let mut config = AppConfig::default();
        let first = config.scheduler.tasks[0].clone();
        config.scheduler.tasks.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.worker.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_s3_driver_requires_bucket() {
        let mut config = AppConfig::default();
        config.storage.driver = StorageDriver::S3;
        assert!(config.validate().is_err());

        config.storage.s3.bucket = "episodes".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_file_reads_storage_driver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s3.toml");
        std::fs::write(
            &path,
            r#"
[storage]
driver = "s3"

[storage.s3]
bucket = "episodes"
prefix = "podvault/"
endpoint = "http://localhost:9000"
force_path_style = true
"#,
        )
        .unwrap();

        let config = AppConfig::load_file(&path).unwrap();
        assert_eq!(config.storage.driver, StorageDriver::S3);
        assert_eq!(config.storage.data_root, "data/objects");
        assert_eq!(config.storage.s3.bucket, "episodes");
        assert_eq!(config.storage.s3.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.storage.s3.region.is_none());
        assert!(config.storage.s3.force_path_style);
    }

    #[test]
    fn test_load_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.toml");
        std::fs::write(
            &path,
            r#"
[queue]
max_receives = 3

[[scheduler.tasks]]
task_name = "feedPoll"
queue = "feedWorker"
interval_seconds = 3600
"#,
        )
        .unwrap();

        let config = AppConfig::load_file(&path).unwrap();
        assert_eq!(config.queue.max_receives, 3);
        assert_eq!(config.queue.backoff_interval_seconds, 10);
        assert_eq!(config.scheduler.tasks.len(), 1);
        assert_eq!(config.scheduler.tasks[0].target_queue(), "feedWorker");
    }
}
