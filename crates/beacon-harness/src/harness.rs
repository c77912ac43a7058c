use crate::error::HarnessResult;
use async_trait::async_trait;
use beacon_analytics::TopUrl;
use beacon_core::UrlAccessedEvent;
use beacon_url_management::ShortenedUrl;
use std::time::Duration;

#[async_trait]
pub trait TestHarness: Send + Sync {
    async fn shorten_url(&self, long_url: &str) -> HarnessResult<ShortenedUrl>;

    /// Returns the long URL the code redirects to.
    async fn resolve_url(&self, short_code: &str) -> HarnessResult<String>;

    async fn get_top_urls(&self, limit: i64) -> HarnessResult<Vec<TopUrl>>;

    /// Every access event handed to the broker since the last reset, in
    /// publish order.
    async fn get_published_events(&self) -> HarnessResult<Vec<UrlAccessedEvent>>;

    /// Blocks until analytics has counted every published event.
    async fn wait_for_events_processed(&self, timeout: Duration) -> HarnessResult<()>;

    /// Forgets all mappings, counters and published events.
    async fn reset(&self) -> HarnessResult<()>;
}
