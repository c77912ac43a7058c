use beacon_core::UrlAccessStats;
use serde::{Deserialize, Serialize};

/// One ranking entry as exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUrl {
    pub short_code: String,
    pub long_url: String,
    pub access_count: u64,
}

impl From<UrlAccessStats> for TopUrl {
    fn from(stats: UrlAccessStats) -> Self {
        Self {
            short_code: stats.short_code.as_str().to_owned(),
            long_url: stats.long_url,
            access_count: stats.access_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUrlsResponse {
    pub urls: Vec<TopUrl>,
}
