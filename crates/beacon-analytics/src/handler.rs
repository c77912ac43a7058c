use crate::service::Analytics;
use async_trait::async_trait;
use beacon_core::{EventHandler, UrlAccessedEvent};
use std::sync::Arc;

/// Feeds `url.accessed` deliveries into [`Analytics::handle_access_event`].
///
/// Errors are returned to the channel, which leaves the message
/// unacknowledged for redelivery.
#[derive(Clone)]
pub struct AccessEventHandler {
    analytics: Arc<dyn Analytics>,
}

impl AccessEventHandler {
    pub fn new(analytics: Arc<dyn Analytics>) -> Self {
        Self { analytics }
    }
}

#[async_trait]
impl EventHandler<UrlAccessedEvent> for AccessEventHandler {
    async fn handle(&self, event: UrlAccessedEvent) -> anyhow::Result<()> {
        self.analytics.handle_access_event(&event).await?;
        Ok(())
    }
}
