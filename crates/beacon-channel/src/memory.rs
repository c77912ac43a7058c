use async_trait::async_trait;
use beacon_core::channel::{Binding, EnvelopeHandler, EventChannel};
use beacon_core::error::{ChannelError, ChannelResult, HandlerError};
use beacon_core::event::{DomainEvent, EventEnvelope};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, warn};

struct Subscription {
    queue: String,
    binding: Binding,
    handler: Arc<dyn EnvelopeHandler>,
}

struct Broker {
    available: bool,
    published: Vec<EventEnvelope>,
    subscriptions: Vec<Subscription>,
    pending: HashMap<String, VecDeque<EventEnvelope>>,
}

impl Default for Broker {
    fn default() -> Self {
        Self {
            available: true,
            published: Vec::new(),
            subscriptions: Vec::new(),
            pending: HashMap::new(),
        }
    }
}

/// An in-process broker that delivers every message synchronously, inside
/// the `publish` call that produced it.
///
/// Handles created with [`for_service`](Self::for_service) share one broker,
/// so a url-management handle and an analytics handle talk to each other
/// exactly like two processes attached to the same exchange.
///
/// Failed deliveries stay pending on their queue until
/// [`redeliver_pending`](Self::redeliver_pending) is called, which models a
/// consumer restart.
#[derive(Clone)]
pub struct InMemoryEventChannel {
    service: String,
    broker: Arc<Mutex<Broker>>,
}

impl InMemoryEventChannel {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            broker: Arc::new(Mutex::new(Broker::default())),
        }
    }

    /// A handle for another service attached to the same broker.
    pub fn for_service(&self, service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            broker: self.broker.clone(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    /// Simulates a broker outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.broker.lock().available = available;
    }

    /// Every envelope accepted by the broker, in publish order.
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.broker.lock().published.clone()
    }

    /// Published envelopes of type `E`, decoded.
    pub fn published_events<E: DomainEvent>(&self) -> Vec<E> {
        self.published()
            .iter()
            .filter(|envelope| envelope.event_type == E::EVENT_TYPE)
            .filter_map(|envelope| envelope.decode::<E>().ok())
            .collect()
    }

    /// Number of unacknowledged messages across all queues.
    pub fn pending_count(&self) -> usize {
        self.broker.lock().pending.values().map(VecDeque::len).sum()
    }

    /// Redelivers every pending message once. Returns how many were
    /// acknowledged this time; the rest stay pending.
    pub async fn redeliver_pending(&self) -> usize {
        let batches: Vec<(String, Arc<dyn EnvelopeHandler>, Vec<EventEnvelope>)> = {
            let mut broker = self.broker.lock();
            let Broker {
                subscriptions,
                pending,
                ..
            } = &mut *broker;
            subscriptions
                .iter()
                .filter_map(|sub| {
                    let queued = pending.remove(&sub.queue)?;
                    Some((sub.queue.clone(), sub.handler.clone(), queued.into()))
                })
                .collect()
        };

        let mut acknowledged = 0;
        for (queue, handler, envelopes) in batches {
            for envelope in envelopes {
                if self.deliver(&queue, handler.as_ref(), envelope).await {
                    acknowledged += 1;
                }
            }
        }
        acknowledged
    }

    /// Returns `true` when the message is acknowledged.
    async fn deliver(
        &self,
        queue: &str,
        handler: &dyn EnvelopeHandler,
        envelope: EventEnvelope,
    ) -> bool {
        match handler.handle(&envelope).await {
            Ok(()) => {
                debug!(queue, event_type = %envelope.event_type, "message acknowledged");
                true
            }
            Err(HandlerError::Decode(err)) => {
                error!(queue, error = %err, "discarding undecodable message");
                true
            }
            Err(err) => {
                error!(queue, error = %err, "handler failed, message left pending");
                self.broker
                    .lock()
                    .pending
                    .entry(queue.to_owned())
                    .or_default()
                    .push_back(envelope);
                false
            }
        }
    }
}

#[async_trait]
impl EventChannel for InMemoryEventChannel {
    async fn connect(&self) -> ChannelResult<()> {
        if self.broker.lock().available {
            Ok(())
        } else {
            Err(ChannelError::BrokerUnavailable(
                "in-memory broker is offline".to_string(),
            ))
        }
    }

    async fn publish(&self, envelope: EventEnvelope) -> ChannelResult<()> {
        let targets: Vec<(String, Arc<dyn EnvelopeHandler>)> = {
            let mut broker = self.broker.lock();
            if !broker.available {
                return Err(ChannelError::BrokerUnavailable(
                    "in-memory broker is offline".to_string(),
                ));
            }
            broker.published.push(envelope.clone());
            broker
                .subscriptions
                .iter()
                .filter(|sub| sub.binding.routing_key == envelope.routing_key)
                .map(|sub| (sub.queue.clone(), sub.handler.clone()))
                .collect()
        };

        if targets.is_empty() {
            warn!(routing_key = %envelope.routing_key, "no queue bound, message dropped");
        }
        for (queue, handler) in targets {
            self.deliver(&queue, handler.as_ref(), envelope.clone())
                .await;
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        binding: Binding,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> ChannelResult<()> {
        let queue = binding.queue_name(&self.service);
        let mut broker = self.broker.lock();
        if !broker.available {
            return Err(ChannelError::BrokerUnavailable(
                "in-memory broker is offline".to_string(),
            ));
        }
        if broker.subscriptions.iter().any(|sub| sub.queue == queue) {
            return Err(ChannelError::Subscribe(format!(
                "queue '{queue}' already has a consumer"
            )));
        }
        debug!(queue = %queue, routing_key = %binding.routing_key, "queue bound");
        broker.subscriptions.push(Subscription {
            queue,
            binding,
            handler,
        });
        Ok(())
    }
}
