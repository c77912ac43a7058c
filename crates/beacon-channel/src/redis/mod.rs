//! Redis Streams adapter.
//!
//! - exchange + routing key → stream `"{exchange}:{routing_key}"`
//! - queue `"{service}.{event_type}"` → consumer group of the same name
//! - acknowledgement → `XACK`, issued only after the handler succeeded
//!
//! Unacknowledged entries stay in the group's pending list. The consumer
//! replays its own pending entries on start and every
//! `redelivery_interval`, which gives at-least-once delivery across
//! handler failures and process restarts.

mod config;
mod consumer;

pub use config::{RedisChannelConfig, DEFAULT_MAX_LEN};

use async_trait::async_trait;
use beacon_core::channel::{Binding, EnvelopeHandler, EventChannel};
use beacon_core::error::{ChannelError, ChannelResult};
use beacon_core::event::EventEnvelope;
use consumer::Consumer;
use parking_lot::{Mutex, RwLock};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const FIELD_EVENT_TYPE: &str = "event_type";
pub const FIELD_ROUTING_KEY: &str = "routing_key";
pub const FIELD_PAYLOAD: &str = "payload";

fn map_redis_error(operation: &str, err: redis::RedisError) -> ChannelError {
    let message = format!("{operation}: {err}");
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        ChannelError::BrokerUnavailable(message)
    } else {
        ChannelError::Publish(message)
    }
}

/// [`EventChannel`] over Redis Streams.
///
/// Publishing shares one auto-reconnecting [`ConnectionManager`]; each
/// subscription runs its own consumer task with its own connection. Tasks
/// are aborted when the channel is dropped.
pub struct RedisEventChannel {
    config: RedisChannelConfig,
    client: redis::Client,
    publisher: RwLock<Option<ConnectionManager>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl RedisEventChannel {
    /// Validates the URL without connecting. Call
    /// [`connect`](EventChannel::connect) before publishing.
    pub fn new(config: RedisChannelConfig) -> ChannelResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            ChannelError::BrokerUnavailable(format!("invalid redis url '{}': {e}", config.url))
        })?;
        Ok(Self {
            config,
            client,
            publisher: RwLock::new(None),
            consumers: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &RedisChannelConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.read().is_some()
    }

    /// Stops every consumer task started by this handle.
    pub fn shutdown(&self) {
        for task in self.consumers.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for RedisEventChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl EventChannel for RedisEventChannel {
    async fn connect(&self) -> ChannelResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        let manager = ConnectionManager::new(self.client.clone())
            .await
            .map_err(|e| {
                ChannelError::BrokerUnavailable(format!("failed to connect to redis: {e}"))
            })?;
        *self.publisher.write() = Some(manager);
        info!(
            service = %self.config.service_name,
            exchange = %self.config.exchange,
            "connected to redis event channel"
        );
        Ok(())
    }

    async fn publish(&self, envelope: EventEnvelope) -> ChannelResult<()> {
        let mut conn = self
            .publisher
            .read()
            .clone()
            .ok_or(ChannelError::NotConnected)?;
        let stream_key = self.config.stream_key(&envelope.routing_key);

        let mut cmd = redis::cmd("XADD");
        cmd.arg(&stream_key);
        if let Some(max_len) = self.config.max_len {
            cmd.arg("MAXLEN").arg("~").arg(max_len);
        }
        let id: String = cmd
            .arg("*")
            .arg(FIELD_EVENT_TYPE)
            .arg(&envelope.event_type)
            .arg(FIELD_ROUTING_KEY)
            .arg(&envelope.routing_key)
            .arg(FIELD_PAYLOAD)
            .arg(&envelope.payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(stream = %stream_key, error = %e, "XADD failed");
                map_redis_error("failed to append to stream", e)
            })?;

        debug!(stream = %stream_key, id = %id, event_type = %envelope.event_type, "event published");
        Ok(())
    }

    async fn subscribe(
        &self,
        binding: Binding,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> ChannelResult<()> {
        let conn = ConnectionManager::new(self.client.clone())
            .await
            .map_err(|e| {
                ChannelError::BrokerUnavailable(format!("failed to connect to redis: {e}"))
            })?;

        let mut consumer = Consumer::new(conn, &self.config, &binding, handler);
        consumer
            .ensure_group()
            .await
            .map_err(|e| ChannelError::Subscribe(format!("failed to create consumer group: {e}")))?;

        info!(
            stream = %consumer.stream_key(),
            group = %consumer.group(),
            "consumer group bound"
        );
        self.consumers.lock().push(tokio::spawn(consumer.run()));
        Ok(())
    }
}
