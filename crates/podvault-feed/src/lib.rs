//! # podvault-feed
//!
//! Fetches podcast RSS feeds over HTTP and turns them into
//! [`ParsedFeed`](podvault_core::traits::ParsedFeed) values. Also owns the
//! shared outbound HTTP helpers (client construction, URL validation).

pub mod guid;
pub mod http;
pub mod mime;
pub mod parser;
pub mod source;

pub use parser::{ParseOutcome, parse_feed};
pub use source::HttpFeedSource;
