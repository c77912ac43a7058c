use crate::error::AnalyticsError;
use async_trait::async_trait;
use beacon_core::{AccessCounterStore, UrlAccessStats, UrlAccessedEvent};
use std::sync::Arc;
use tracing::{info, trace};

#[async_trait]
pub trait Analytics: Send + Sync + 'static {
    /// Counts one access. Redelivered duplicates are counted again.
    async fn handle_access_event(&self, event: &UrlAccessedEvent) -> Result<(), AnalyticsError>;

    /// Most-accessed URLs first, ties in insertion order. `limit` must be
    /// positive.
    async fn get_top_urls(&self, limit: i64) -> Result<Vec<UrlAccessStats>, AnalyticsError>;
}

#[derive(Debug)]
pub struct AnalyticsService<S> {
    store: Arc<S>,
}

impl<S: AccessCounterStore> AnalyticsService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl<S> Clone for AnalyticsService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

#[async_trait]
impl<S: AccessCounterStore> Analytics for AnalyticsService<S> {
    async fn handle_access_event(&self, event: &UrlAccessedEvent) -> Result<(), AnalyticsError> {
        let mut tx = self.store.begin().await?;
        tx.increment_access_count(&event.short_code, &event.long_url, event.accessed_at)
            .await?;
        tx.commit().await?;

        info!(short_code = %event.short_code, "access counted");
        Ok(())
    }

    async fn get_top_urls(&self, limit: i64) -> Result<Vec<UrlAccessStats>, AnalyticsError> {
        if limit <= 0 {
            return Err(AnalyticsError::InvalidLimit(limit));
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let mut tx = self.store.begin().await?;
        let top = tx.top_by_access_count(limit).await?;
        trace!(limit, returned = top.len(), "ranking served");
        Ok(top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::ShortCode;
    use beacon_storage::InMemoryAccessCounterStore;

    fn test_service() -> AnalyticsService<InMemoryAccessCounterStore> {
        AnalyticsService::new(InMemoryAccessCounterStore::new())
    }

    fn event(code: &str, url: &str) -> UrlAccessedEvent {
        UrlAccessedEvent::now(ShortCode::new_unchecked(code), url)
    }

    async fn access(service: &AnalyticsService<InMemoryAccessCounterStore>, code: &str, url: &str, times: usize) {
        for _ in 0..times {
            service.handle_access_event(&event(code, url)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn popular_url_ranks_first() {
        let service = test_service();
        access(&service, "9241e624", "https://example.com/popular", 3).await;
        access(&service, "b40ab5f6", "https://example.com/less-popular", 1).await;

        let top = service.get_top_urls(10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].long_url, "https://example.com/popular");
        assert_eq!(top[0].access_count, 3);
        assert_eq!(top[1].long_url, "https://example.com/less-popular");
        assert_eq!(top[1].access_count, 1);
    }

    #[tokio::test]
    async fn empty_stats() {
        let service = test_service();
        assert!(service.get_top_urls(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn limit_truncates() {
        let service = test_service();
        access(&service, "aaa", "https://a.example", 1).await;
        access(&service, "bbb", "https://b.example", 2).await;
        access(&service, "ccc", "https://c.example", 3).await;

        let top = service.get_top_urls(2).await.unwrap();
        let counts: Vec<_> = top.iter().map(|s| s.access_count).collect();
        assert_eq!(counts, vec![3, 2]);
    }

    #[tokio::test]
    async fn non_positive_limit_is_rejected() {
        let service = test_service();
        for limit in [0, -1, i64::MIN] {
            let err = service.get_top_urls(limit).await.unwrap_err();
            assert!(matches!(err, AnalyticsError::InvalidLimit(l) if l == limit));
        }
    }

    #[tokio::test]
    async fn duplicate_deliveries_count_twice() {
        let service = test_service();
        let event = event("abc123", "https://example.com");
        service.handle_access_event(&event).await.unwrap();
        service.handle_access_event(&event).await.unwrap();

        let top = service.get_top_urls(1).await.unwrap();
        assert_eq!(top[0].access_count, 2);
        assert_eq!(top[0].last_accessed_at, Some(event.accessed_at));
    }
}
