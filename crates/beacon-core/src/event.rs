use crate::error::ChannelError;
use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An event that can travel over an [`EventChannel`](crate::EventChannel).
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the event type; consuming queues are `"{service}.{EVENT_TYPE}"`.
    const EVENT_TYPE: &'static str;
    /// Topic the event is published on by default.
    const ROUTING_KEY: &'static str;
}

/// Emitted once per successful resolution.
///
/// Wire form: `{"shortCode": "...", "longUrl": "...", "accessedAt": "<RFC 3339>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlAccessedEvent {
    pub short_code: ShortCode,
    pub long_url: String,
    pub accessed_at: Timestamp,
}

impl UrlAccessedEvent {
    pub fn now(short_code: ShortCode, long_url: impl Into<String>) -> Self {
        Self {
            short_code,
            long_url: long_url.into(),
            accessed_at: Timestamp::now(),
        }
    }
}

impl DomainEvent for UrlAccessedEvent {
    const EVENT_TYPE: &'static str = "UrlAccessedEvent";
    const ROUTING_KEY: &'static str = "url.accessed";
}

/// Transport-level message: a typed event serialized to JSON plus routing
/// metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_type: String,
    pub routing_key: String,
    pub payload: String,
}

impl EventEnvelope {
    pub fn encode<E: DomainEvent>(event: &E, routing_key: &str) -> Result<Self, ChannelError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| ChannelError::Serialization(format!("failed to encode event: {e}")))?;
        Ok(Self {
            event_type: E::EVENT_TYPE.to_string(),
            routing_key: routing_key.to_string(),
            payload,
        })
    }

    pub fn decode<E: DomainEvent>(&self) -> Result<E, ChannelError> {
        serde_json::from_str(&self.payload).map_err(|e| {
            ChannelError::Serialization(format!(
                "failed to decode {} payload: {e}",
                self.event_type
            ))
        })
    }
}
