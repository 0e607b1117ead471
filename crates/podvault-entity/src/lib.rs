//! # podvault-entity
//!
//! Domain entity models for PodVault. Every struct in this crate represents
//! a database table row or a domain value object. Database entities
//! implement `sqlx::FromRow` for SQLite rows; timestamps are persisted as
//! integer milliseconds since the Unix epoch (see [`timestamp`]).

pub mod podcast;
pub mod queue;
pub mod timestamp;
