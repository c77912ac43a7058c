//! The write-path service: shortens long URLs and resolves short codes,
//! publishing a [`UrlAccessedEvent`](beacon_core::UrlAccessedEvent) for
//! every successful resolution.

pub mod error;
pub mod http;
pub mod model;
pub mod service;

pub use error::UrlManagementError;
pub use model::{ResolvedUrl, ShortenOutcome, ShortenedUrl};
pub use service::{UrlManagement, UrlManagementService};

/// Name used for queues and log fields.
pub const SERVICE_NAME: &str = "url-management";
