//! Shared value types.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};
