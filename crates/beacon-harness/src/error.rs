use beacon_analytics::AnalyticsError;
use beacon_core::ChannelError;
use beacon_url_management::UrlManagementError;
use thiserror::Error;

/// Failures as seen by a use-case test. Both harnesses report domain
/// failures through the same tagged variants.
#[derive(Debug, Clone, Error)]
pub enum HarnessError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("url not found: {0}")]
    UrlNotFound(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("deployment failure: {0}")]
    Deployment(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

impl From<UrlManagementError> for HarnessError {
    fn from(err: UrlManagementError) -> Self {
        match err {
            UrlManagementError::InvalidUrl(message) => Self::InvalidUrl(message),
            UrlManagementError::UrlNotFound(code) => Self::UrlNotFound(code),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl From<AnalyticsError> for HarnessError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::InvalidLimit(_) => Self::InvalidLimit(err.to_string()),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl From<ChannelError> for HarnessError {
    fn from(err: ChannelError) -> Self {
        Self::Unexpected(err.to_string())
    }
}

impl From<reqwest::Error> for HarnessError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<redis::RedisError> for HarnessError {
    fn from(err: redis::RedisError) -> Self {
        Self::Transport(format!("redis: {err}"))
    }
}

impl From<sqlx::Error> for HarnessError {
    fn from(err: sqlx::Error) -> Self {
        Self::Transport(format!("mysql: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::StorageError;

    #[test]
    fn domain_errors_keep_their_tag() {
        let err = HarnessError::from(UrlManagementError::UrlNotFound("abc".into()));
        assert!(matches!(err, HarnessError::UrlNotFound(code) if code == "abc"));

        let err = HarnessError::from(AnalyticsError::InvalidLimit(0));
        assert!(matches!(err, HarnessError::InvalidLimit(_)));

        let err = HarnessError::from(UrlManagementError::Persistence(StorageError::Timeout(
            "pool".into(),
        )));
        assert!(matches!(err, HarnessError::Unexpected(_)));
    }
}
