use crate::service::UrlManagement;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    service: Arc<dyn UrlManagement>,
}

impl AppState {
    pub fn new(service: Arc<dyn UrlManagement>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &dyn UrlManagement {
        self.service.as_ref()
    }
}
