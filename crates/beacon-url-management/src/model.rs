use beacon_core::ShortCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenedUrl {
    pub short_code: ShortCode,
    pub short_url: String,
    pub long_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenOutcome {
    pub url: ShortenedUrl,
    /// `false` when the long URL had already been shortened.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub long_url: String,
    /// `false` when the access event could not be handed to the broker.
    pub event_published: bool,
}
