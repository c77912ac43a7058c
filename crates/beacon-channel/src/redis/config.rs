use std::time::Duration;
use typed_builder::TypedBuilder;

/// Connection and polling settings for [`RedisEventChannel`](super::RedisEventChannel).
///
/// The exchange is a key prefix: messages routed with key `url.accessed`
/// land on the stream `"{exchange}:url.accessed"`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisChannelConfig {
    #[builder(setter(into))]
    pub url: String,
    /// Owning service; names the consumer groups this handle creates.
    #[builder(setter(into))]
    pub service_name: String,
    #[builder(default = "beacon".to_string(), setter(into))]
    pub exchange: String,
    /// Consumer name inside each group. Reusing the name after a restart
    /// picks up the previous run's unacknowledged entries.
    #[builder(default = "worker-1".to_string(), setter(into))]
    pub consumer_name: String,
    #[builder(default = 10)]
    pub batch_size: usize,
    #[builder(default = Duration::from_millis(100))]
    pub poll_interval: Duration,
    #[builder(default = Duration::from_secs(5))]
    pub redelivery_interval: Duration,
    /// Approximate cap on entries kept per stream (`XADD ... MAXLEN ~`).
    /// Acknowledged entries are never removed otherwise. A backlog longer
    /// than the cap loses its oldest entries. `None` disables trimming.
    #[builder(default = Some(DEFAULT_MAX_LEN))]
    pub max_len: Option<usize>,
}

pub const DEFAULT_MAX_LEN: usize = 100_000;

impl RedisChannelConfig {
    pub fn stream_key(&self, routing_key: &str) -> String {
        format!("{}:{}", self.exchange, routing_key)
    }
}
