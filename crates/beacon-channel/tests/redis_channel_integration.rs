use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_channel::{
    ChannelError, EventChannel, EventChannelExt, RedisChannelConfig, RedisEventChannel,
};
use beacon_core::{DomainEvent, EventEnvelope, EventHandler, ShortCode, UrlAccessedEvent};
use beacon_test_infra::redis::RedisServer;

struct Fixture {
    _redis: RedisServer,
    url: String,
}

impl Fixture {
    async fn start() -> Self {
        let redis = RedisServer::new().await.expect("start redis");
        let url = redis.redis_url().await.expect("redis url");
        Self { _redis: redis, url }
    }

    fn config(&self, service: &str) -> RedisChannelConfig {
        RedisChannelConfig::builder()
            .url(self.url.as_str())
            .service_name(service)
            .poll_interval(Duration::from_millis(20))
            .redelivery_interval(Duration::from_millis(200))
            .build()
    }

    async fn channel(&self, service: &str) -> RedisEventChannel {
        let channel = RedisEventChannel::new(self.config(service)).expect("channel");
        channel.connect().await.expect("connect");
        channel
    }
}

#[derive(Clone, Default)]
struct Counting {
    seen: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl EventHandler<UrlAccessedEvent> for Counting {
    async fn handle(&self, _event: UrlAccessedEvent) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn event() -> UrlAccessedEvent {
    UrlAccessedEvent::now(ShortCode::new_unchecked("abc123"), "https://example.com")
}

async fn wait_for(counter: &AtomicUsize, expected: usize) {
    awaitility::at_most(Duration::from_secs(10))
        .poll_interval(Duration::from_millis(50))
        .until_async(move || async move { counter.load(Ordering::SeqCst) == expected })
        .await;
}

#[tokio::test]
async fn publish_before_connect_is_rejected() {
    let channel = RedisEventChannel::new(
        RedisChannelConfig::builder()
            .url("redis://127.0.0.1:1")
            .service_name("url-management")
            .build(),
    )
    .unwrap();

    let err = channel
        .publish_event(&event(), UrlAccessedEvent::ROUTING_KEY)
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::NotConnected));
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn delivers_published_events_to_consumer_group() {
    let fixture = Fixture::start().await;
    let consumer = fixture.channel("analytics").await;
    let handler = Counting::default();
    consumer.subscribe_to::<UrlAccessedEvent, _>(handler.clone()).await.unwrap();

    let publisher = fixture.channel("url-management").await;
    for _ in 0..3 {
        publisher
            .publish_event(&event(), UrlAccessedEvent::ROUTING_KEY)
            .await
            .unwrap();
    }

    wait_for(&handler.seen, 3).await;
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn events_published_before_subscribe_are_not_lost() {
    let fixture = Fixture::start().await;

    // Binding the queue first makes it durable, like declaring it up front.
    let consumer = fixture.channel("analytics").await;
    consumer.subscribe_to::<UrlAccessedEvent, _>(Counting::default()).await.unwrap();
    consumer.shutdown();

    let publisher = fixture.channel("url-management").await;
    publisher
        .publish_event(&event(), UrlAccessedEvent::ROUTING_KEY)
        .await
        .unwrap();

    let restarted = fixture.channel("analytics").await;
    let handler = Counting::default();
    restarted.subscribe_to::<UrlAccessedEvent, _>(handler.clone()).await.unwrap();

    wait_for(&handler.seen, 1).await;
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn failed_deliveries_are_redelivered() {
    let fixture = Fixture::start().await;
    let consumer = fixture.channel("analytics").await;
    let handler = Counting::default();
    handler.failing.store(true, Ordering::SeqCst);
    consumer.subscribe_to::<UrlAccessedEvent, _>(handler.clone()).await.unwrap();

    let publisher = fixture.channel("url-management").await;
    publisher
        .publish_event(&event(), UrlAccessedEvent::ROUTING_KEY)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handler.seen.load(Ordering::SeqCst), 0);

    handler.failing.store(false, Ordering::SeqCst);
    wait_for(&handler.seen, 1).await;
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn undecodable_entries_are_acknowledged_and_skipped() {
    let fixture = Fixture::start().await;
    let consumer = fixture.channel("analytics").await;
    let handler = Counting::default();
    consumer.subscribe_to::<UrlAccessedEvent, _>(handler.clone()).await.unwrap();

    let publisher = fixture.channel("url-management").await;
    publisher
        .publish(EventEnvelope {
            event_type: UrlAccessedEvent::EVENT_TYPE.to_string(),
            routing_key: UrlAccessedEvent::ROUTING_KEY.to_string(),
            payload: "not json".to_string(),
        })
        .await
        .unwrap();
    publisher
        .publish_event(&event(), UrlAccessedEvent::ROUTING_KEY)
        .await
        .unwrap();

    wait_for(&handler.seen, 1).await;
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn publishing_trims_the_stream_to_max_len() {
    let fixture = Fixture::start().await;
    let publisher = RedisEventChannel::new(
        RedisChannelConfig::builder()
            .url(fixture.url.as_str())
            .service_name("url-management")
            .max_len(Some(10))
            .build(),
    )
    .unwrap();
    publisher.connect().await.unwrap();

    for _ in 0..300 {
        publisher
            .publish_event(&event(), UrlAccessedEvent::ROUTING_KEY)
            .await
            .unwrap();
    }

    let client = redis::Client::open(fixture.url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let len: u64 = redis::cmd("XLEN")
        .arg(publisher.config().stream_key(UrlAccessedEvent::ROUTING_KEY))
        .query_async(&mut conn)
        .await
        .unwrap();
    // `MAXLEN ~` trims whole radix-tree nodes only.
    assert!(len < 300, "stream kept {len} entries");
}
