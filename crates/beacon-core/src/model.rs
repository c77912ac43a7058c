use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A persisted long URL to short code mapping. Owned by url-management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlMapping {
    pub id: i64,
    pub short_code: ShortCode,
    pub long_url: String,
    pub created_at: Timestamp,
}

/// A mapping that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrlMapping {
    pub short_code: ShortCode,
    pub long_url: String,
    pub created_at: Timestamp,
}

impl NewUrlMapping {
    pub fn new(short_code: ShortCode, long_url: impl Into<String>) -> Self {
        Self {
            short_code,
            long_url: long_url.into(),
            created_at: Timestamp::now(),
        }
    }
}

/// Per-code access counter. Owned by analytics.
///
/// `id` reflects insertion order and breaks ties in rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlAccessStats {
    pub id: i64,
    pub short_code: ShortCode,
    pub long_url: String,
    pub access_count: u64,
    pub last_accessed_at: Option<Timestamp>,
}
