use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("invalid short code: {0}")]
pub struct InvalidShortCode(pub String);

/// Errors raised by repository adapters.
///
/// "Not found" is not an error at this layer; lookups return `Ok(None)`.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// A unique constraint (short code or long URL) was violated.
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Errors raised by event channel adapters.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),
    #[error("channel is not connected")]
    NotConnected,
    #[error("failed to publish event: {0}")]
    Publish(String),
    #[error("failed to subscribe: {0}")]
    Subscribe(String),
    #[error("event serialization failed: {0}")]
    Serialization(String),
}

/// Outcome of a failed delivery, as seen by the channel.
///
/// A `Decode` failure can never succeed on redelivery, so channels discard
/// the message. A `Failed` delivery stays pending and is redelivered.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("undecodable message: {0}")]
    Decode(ChannelError),
    #[error("handler failed: {0:#}")]
    Failed(anyhow::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;
