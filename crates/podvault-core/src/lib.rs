//! # podvault-core
//!
//! Core crate for PodVault. Contains configuration schemas, the unified
//! error system, the [`Clock`](types::clock::Clock) abstraction and the
//! traits implemented by external collaborators (feed fetching, episode
//! storage).
//!
//! This crate has **no** internal dependencies on other PodVault crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
