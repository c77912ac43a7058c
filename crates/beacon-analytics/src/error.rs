use beacon_core::StorageError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AnalyticsError {
    #[error("limit must be positive, got {0}")]
    InvalidLimit(i64),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}
