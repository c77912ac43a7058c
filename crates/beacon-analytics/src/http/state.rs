use crate::service::Analytics;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    analytics: Arc<dyn Analytics>,
}

impl AppState {
    pub fn new(analytics: Arc<dyn Analytics>) -> Self {
        Self { analytics }
    }

    pub fn analytics(&self) -> &dyn Analytics {
        self.analytics.as_ref()
    }
}
