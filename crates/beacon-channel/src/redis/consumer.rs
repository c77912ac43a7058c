use super::{RedisChannelConfig, FIELD_EVENT_TYPE, FIELD_PAYLOAD, FIELD_ROUTING_KEY};
use beacon_core::channel::{Binding, EnvelopeHandler};
use beacon_core::error::HandlerError;
use beacon_core::event::EventEnvelope;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamReadReply};
use redis::RedisResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Reads this consumer's own pending history instead of new entries.
const PENDING_HISTORY: &str = "0";
const NEW_ENTRIES: &str = ">";

pub(crate) struct Consumer {
    conn: ConnectionManager,
    stream_key: String,
    group: String,
    name: String,
    handler: Arc<dyn EnvelopeHandler>,
    batch_size: usize,
    poll_interval: Duration,
    redelivery_interval: Duration,
}

impl Consumer {
    pub(crate) fn new(
        conn: ConnectionManager,
        config: &RedisChannelConfig,
        binding: &Binding,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> Self {
        Self {
            conn,
            stream_key: config.stream_key(&binding.routing_key),
            group: binding.queue_name(&config.service_name),
            name: config.consumer_name.clone(),
            handler,
            batch_size: config.batch_size.max(1),
            poll_interval: config.poll_interval,
            redelivery_interval: config.redelivery_interval,
        }
    }

    pub(crate) fn stream_key(&self) -> &str {
        &self.stream_key
    }

    pub(crate) fn group(&self) -> &str {
        &self.group
    }

    /// Creates the consumer group (and the stream) if missing.
    pub(crate) async fn ensure_group(&mut self) -> RedisResult<()> {
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut self.conn)
            .await;

        match result {
            Err(err) if err.code() == Some("BUSYGROUP") => Ok(()),
            other => other,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(stream = %self.stream_key, group = %self.group, consumer = %self.name, "consumer started");

        self.redeliver_pending().await;
        let mut last_redelivery = Instant::now();

        loop {
            if last_redelivery.elapsed() >= self.redelivery_interval {
                self.redeliver_pending().await;
                last_redelivery = Instant::now();
            }

            match self.read(NEW_ENTRIES).await {
                Ok(entries) if entries.is_empty() => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Ok(entries) => {
                    for entry in entries {
                        self.process(entry).await;
                    }
                }
                Err(err) if err.code() == Some("NOGROUP") => {
                    warn!(group = %self.group, "consumer group vanished, recreating");
                    if let Err(err) = self.ensure_group().await {
                        warn!(group = %self.group, error = %err, "failed to recreate consumer group");
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                Err(err) => {
                    warn!(stream = %self.stream_key, error = %err, "XREADGROUP failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Walks this consumer's pending list once, oldest first.
    async fn redeliver_pending(&mut self) {
        let mut cursor = PENDING_HISTORY.to_string();
        loop {
            let entries = match self.read(&cursor).await {
                Ok(entries) => entries,
                Err(err) => {
                    if err.code() == Some("NOGROUP") {
                        if let Err(err) = self.ensure_group().await {
                            warn!(group = %self.group, error = %err, "failed to recreate consumer group");
                        }
                    } else {
                        warn!(group = %self.group, error = %err, "failed to read pending entries");
                    }
                    return;
                }
            };
            let Some(last) = entries.last() else {
                return;
            };
            cursor = last.id.clone();
            debug!(group = %self.group, count = entries.len(), "redelivering pending entries");
            for entry in entries {
                self.process(entry).await;
            }
        }
    }

    async fn read(&mut self, id: &str) -> RedisResult<Vec<StreamId>> {
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(&self.name)
            .arg("COUNT")
            .arg(self.batch_size)
            .arg("STREAMS")
            .arg(&self.stream_key)
            .arg(id)
            .query_async(&mut self.conn)
            .await?;

        Ok(reply
            .map(|reply| reply.keys.into_iter().flat_map(|key| key.ids).collect())
            .unwrap_or_default())
    }

    async fn process(&mut self, entry: StreamId) {
        let Some(envelope) = envelope_from(&entry) else {
            error!(group = %self.group, id = %entry.id, "discarding malformed stream entry");
            self.ack(&entry.id).await;
            return;
        };

        match self.handler.handle(&envelope).await {
            Ok(()) => self.ack(&entry.id).await,
            Err(HandlerError::Decode(err)) => {
                error!(group = %self.group, id = %entry.id, error = %err, "discarding undecodable message");
                self.ack(&entry.id).await;
            }
            Err(err) => {
                error!(group = %self.group, id = %entry.id, error = %err, "handler failed, entry left pending");
            }
        }
    }

    async fn ack(&mut self, id: &str) {
        let result: RedisResult<i64> = redis::cmd("XACK")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg(id)
            .query_async(&mut self.conn)
            .await;

        match result {
            Ok(_) => trace!(group = %self.group, id, "entry acknowledged"),
            Err(err) => warn!(group = %self.group, id, error = %err, "XACK failed, entry will be redelivered"),
        }
    }
}

fn envelope_from(entry: &StreamId) -> Option<EventEnvelope> {
    Some(EventEnvelope {
        event_type: entry.get(FIELD_EVENT_TYPE)?,
        routing_key: entry.get(FIELD_ROUTING_KEY)?,
        payload: entry.get(FIELD_PAYLOAD)?,
    })
}
