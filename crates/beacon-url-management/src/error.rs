use beacon_core::StorageError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum UrlManagementError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("url not found: {0}")]
    UrlNotFound(String),
    /// Every candidate code for this URL is owned by a different URL.
    #[error("no free short code for '{0}'")]
    ShortCodeCollision(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}
