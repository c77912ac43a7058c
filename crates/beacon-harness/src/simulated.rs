use crate::error::HarnessResult;
use crate::harness::TestHarness;
use async_trait::async_trait;
use beacon_analytics::{AccessEventHandler, Analytics, AnalyticsService, TopUrl};
use beacon_channel::{EventChannelExt, InMemoryEventChannel};
use beacon_core::UrlAccessedEvent;
use beacon_storage::{InMemoryAccessCounterStore, InMemoryUrlMappingStore};
use beacon_url_management::{ShortenedUrl, UrlManagement, UrlManagementService};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const SIMULATED_BASE_URL: &str = "http://localhost:8001";

struct Composition {
    url_management: Arc<dyn UrlManagement>,
    analytics: Arc<dyn Analytics>,
    channel: InMemoryEventChannel,
}

impl Composition {
    async fn build(base_url: &str) -> HarnessResult<Self> {
        let channel = InMemoryEventChannel::new(beacon_url_management::SERVICE_NAME);

        let analytics: Arc<dyn Analytics> =
            Arc::new(AnalyticsService::new(InMemoryAccessCounterStore::new()));
        channel
            .for_service(beacon_analytics::SERVICE_NAME)
            .subscribe_to::<UrlAccessedEvent, _>(AccessEventHandler::new(analytics.clone()))
            .await?;

        let url_management = Arc::new(UrlManagementService::new(
            InMemoryUrlMappingStore::new(),
            Arc::new(channel.clone()),
            base_url,
        ));

        Ok(Self {
            url_management,
            analytics,
            channel,
        })
    }
}

/// Both services and one in-memory broker inside the test process.
///
/// Events are consumed synchronously inside `resolve_url`, so there is
/// never anything to wait for.
pub struct SimulatedHarness {
    base_url: String,
    composition: Mutex<Arc<Composition>>,
}

impl SimulatedHarness {
    pub async fn new() -> HarnessResult<Self> {
        Self::with_base_url(SIMULATED_BASE_URL).await
    }

    pub async fn with_base_url(base_url: impl Into<String>) -> HarnessResult<Self> {
        let base_url = base_url.into();
        let composition = Composition::build(&base_url).await?;
        Ok(Self {
            base_url,
            composition: Mutex::new(Arc::new(composition)),
        })
    }

    /// The broker of the current composition, for fault injection.
    pub fn channel(&self) -> InMemoryEventChannel {
        self.current().channel.clone()
    }

    fn current(&self) -> Arc<Composition> {
        self.composition.lock().clone()
    }
}

#[async_trait]
impl TestHarness for SimulatedHarness {
    async fn shorten_url(&self, long_url: &str) -> HarnessResult<ShortenedUrl> {
        let outcome = self.current().url_management.shorten_url(long_url).await?;
        Ok(outcome.url)
    }

    async fn resolve_url(&self, short_code: &str) -> HarnessResult<String> {
        let resolved = self.current().url_management.resolve_url(short_code).await?;
        Ok(resolved.long_url)
    }

    async fn get_top_urls(&self, limit: i64) -> HarnessResult<Vec<TopUrl>> {
        let top = self.current().analytics.get_top_urls(limit).await?;
        Ok(top.into_iter().map(TopUrl::from).collect())
    }

    async fn get_published_events(&self) -> HarnessResult<Vec<UrlAccessedEvent>> {
        Ok(self.current().channel.published_events::<UrlAccessedEvent>())
    }

    async fn wait_for_events_processed(&self, _timeout: Duration) -> HarnessResult<()> {
        Ok(())
    }

    async fn reset(&self) -> HarnessResult<()> {
        let fresh = Composition::build(&self.base_url).await?;
        *self.composition.lock() = Arc::new(fresh);
        debug!("simulated composition rebuilt");
        Ok(())
    }
}
