//! Convenience result type alias for PodVault.

use crate::error::AppError;

/// A specialized `Result` type for PodVault operations.
pub type AppResult<T> = Result<T, AppError>;
