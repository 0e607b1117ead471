//! Derived task states and per-queue counts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical state of a queue task, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Eligible for lease.
    Pending,
    /// Inside an active visibility window.
    Leased,
    /// Received more than the allowed number of times; never leased again.
    Exhausted,
}

impl TaskState {
    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Leased => "leased",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task counts by derived state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks eligible for lease now.
    pub pending: i64,
    /// Tasks inside a visibility window (leased or backing off).
    pub leased: i64,
    /// Tasks past the receive limit.
    pub exhausted: i64,
}

impl QueueStats {
    /// Total number of rows counted.
    pub fn total(&self) -> i64 {
        self.pending + self.leased + self.exhausted
    }
}
