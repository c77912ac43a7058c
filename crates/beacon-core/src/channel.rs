use crate::error::{ChannelResult, HandlerError};
use crate::event::{DomainEvent, EventEnvelope};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    pub event_type: String,
    pub routing_key: String,
}

impl Binding {
    pub fn of<E: DomainEvent>() -> Self {
        Self {
            event_type: E::EVENT_TYPE.to_string(),
            routing_key: E::ROUTING_KEY.to_string(),
        }
    }

    /// Durable queue owned by `service` for this binding.
    pub fn queue_name(&self, service: &str) -> String {
        format!("{}.{}", service, self.event_type)
    }
}

/// Publish/subscribe port with at-least-once delivery.
///
/// Implementations acknowledge a message only after its handler returned
/// `Ok`. Handler failures are never surfaced to the publisher.
#[async_trait]
pub trait EventChannel: Send + Sync + 'static {
    async fn connect(&self) -> ChannelResult<()>;

    async fn publish(&self, envelope: EventEnvelope) -> ChannelResult<()>;

    async fn subscribe(
        &self,
        binding: Binding,
        handler: Arc<dyn EnvelopeHandler>,
    ) -> ChannelResult<()>;
}

/// Untyped delivery callback used by channel adapters.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError>;
}

/// Typed consumer of a single event type.
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync + 'static {
    async fn handle(&self, event: E) -> anyhow::Result<()>;
}

/// Typed helpers over [`EventChannel`].
#[async_trait]
pub trait EventChannelExt: EventChannel {
    async fn publish_event<E: DomainEvent>(&self, event: &E, routing_key: &str)
        -> ChannelResult<()>;

    async fn subscribe_to<E, H>(&self, handler: H) -> ChannelResult<()>
    where
        E: DomainEvent,
        H: EventHandler<E>;
}

#[async_trait]
impl<T: EventChannel + ?Sized> EventChannelExt for T {
    async fn publish_event<E: DomainEvent>(
        &self,
        event: &E,
        routing_key: &str,
    ) -> ChannelResult<()> {
        let envelope = EventEnvelope::encode(event, routing_key)?;
        self.publish(envelope).await
    }

    async fn subscribe_to<E, H>(&self, handler: H) -> ChannelResult<()>
    where
        E: DomainEvent,
        H: EventHandler<E>,
    {
        let handler: Arc<dyn EnvelopeHandler> = Arc::new(TypedHandler::new(handler));
        self.subscribe(Binding::of::<E>(), handler).await
    }
}

struct TypedHandler<E, H> {
    inner: H,
    _event: PhantomData<fn() -> E>,
}

impl<E, H> TypedHandler<E, H> {
    fn new(inner: H) -> Self {
        Self {
            inner,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> EnvelopeHandler for TypedHandler<E, H>
where
    E: DomainEvent,
    H: EventHandler<E>,
{
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let event = envelope.decode::<E>().map_err(HandlerError::Decode)?;
        self.inner.handle(event).await.map_err(HandlerError::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::event::UrlAccessedEvent;
    use crate::shortcode::ShortCode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        bindings: Mutex<Vec<(Binding, Arc<dyn EnvelopeHandler>)>>,
        published: Mutex<Vec<EventEnvelope>>,
    }

    #[async_trait]
    impl EventChannel for Recorder {
        async fn connect(&self) -> ChannelResult<()> {
            Ok(())
        }

        async fn publish(&self, envelope: EventEnvelope) -> ChannelResult<()> {
            self.published.lock().unwrap().push(envelope);
            Ok(())
        }

        async fn subscribe(
            &self,
            binding: Binding,
            handler: Arc<dyn EnvelopeHandler>,
        ) -> ChannelResult<()> {
            self.bindings.lock().unwrap().push((binding, handler));
            Ok(())
        }
    }

    struct Collect(Arc<Mutex<Vec<UrlAccessedEvent>>>);

    #[async_trait]
    impl EventHandler<UrlAccessedEvent> for Collect {
        async fn handle(&self, event: UrlAccessedEvent) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct Reject;

    #[async_trait]
    impl EventHandler<UrlAccessedEvent> for Reject {
        async fn handle(&self, _event: UrlAccessedEvent) -> anyhow::Result<()> {
            anyhow::bail!("database down")
        }
    }

    fn event() -> UrlAccessedEvent {
        UrlAccessedEvent::now(ShortCode::new_unchecked("abc123"), "https://example.com")
    }

    #[test]
    fn queue_name_is_service_dot_event_type() {
        let binding = Binding::of::<UrlAccessedEvent>();
        assert_eq!(binding.queue_name("analytics"), "analytics.UrlAccessedEvent");
        assert_eq!(binding.routing_key, "url.accessed");
    }

    #[tokio::test]
    async fn typed_subscription_decodes_envelopes() {
        let channel = Recorder::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        channel.subscribe_to::<UrlAccessedEvent, _>(Collect(seen.clone())).await.unwrap();

        let event = event();
        channel
            .publish_event(&event, UrlAccessedEvent::ROUTING_KEY)
            .await
            .unwrap();

        let envelope = channel.published.lock().unwrap()[0].clone();
        let handler = channel.bindings.lock().unwrap()[0].1.clone();
        handler.handle(&envelope).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), &[event]);
    }

    #[tokio::test]
    async fn typed_handler_separates_decode_and_handler_failures() {
        let channel = Recorder::default();
        channel.subscribe_to::<UrlAccessedEvent, _>(Reject).await.unwrap();
        let handler = channel.bindings.lock().unwrap()[0].1.clone();

        let good = EventEnvelope::encode(&event(), "url.accessed").unwrap();
        let err = handler.handle(&good).await.unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));

        let oversized_code = EventEnvelope {
            payload: good.payload.replace("abc123", &"a".repeat(40)),
            ..good.clone()
        };
        let err = handler.handle(&oversized_code).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Decode(ChannelError::Serialization(_))
        ));

        let garbage = EventEnvelope {
            payload: "not json".to_string(),
            ..good
        };
        let err = handler.handle(&garbage).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Decode(ChannelError::Serialization(_))
        ));
    }
}
