//! The read-path service: consumes access events into durable counters and
//! serves rankings.

pub mod error;
pub mod handler;
pub mod http;
pub mod model;
pub mod service;

pub use error::AnalyticsError;
pub use handler::AccessEventHandler;
pub use model::{TopUrl, TopUrlsResponse};
pub use service::{Analytics, AnalyticsService};

pub const SERVICE_NAME: &str = "analytics";

/// Ranking size when the caller does not pass a limit.
pub const DEFAULT_TOP_LIMIT: i64 = 10;
