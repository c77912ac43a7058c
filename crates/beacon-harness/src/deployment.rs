use crate::error::{HarnessError, HarnessResult};
use crate::networked::{NetworkedConfig, NetworkedHarness};
use axum::Router;
use beacon_analytics::{AccessEventHandler, Analytics, AnalyticsService};
use beacon_channel::{EventChannel, EventChannelExt, RedisChannelConfig, RedisEventChannel};
use beacon_core::UrlAccessedEvent;
use beacon_storage::{MySqlAccessCounterStore, MySqlUrlMappingStore};
use beacon_test_infra::mysql::MySqlServer;
use beacon_test_infra::redis::RedisServer;
use beacon_url_management::UrlManagementService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Both services running in-process on ephemeral ports, each with its own
/// MySQL container, sharing one Redis container.
///
/// Everything is torn down when this value is dropped.
pub struct LocalDeployment {
    harness: NetworkedHarness,
    url_management_addr: SocketAddr,
    analytics_addr: SocketAddr,
    servers: Vec<JoinHandle<()>>,
    _channels: Vec<Arc<RedisEventChannel>>,
    _url_db: MySqlServer,
    _analytics_db: MySqlServer,
    _redis: RedisServer,
}

impl LocalDeployment {
    pub async fn start() -> HarnessResult<Self> {
        let (url_db, analytics_db, redis) = tokio::try_join!(
            MySqlServer::with_database("url_management"),
            MySqlServer::with_database("analytics"),
            RedisServer::new(),
        )
        .map_err(deployment)?;

        let url_dsn = url_db.database_url().await.map_err(deployment)?;
        let analytics_dsn = analytics_db.database_url().await.map_err(deployment)?;
        let redis_url = redis.redis_url().await.map_err(deployment)?;

        let mapping_store = MySqlUrlMappingStore::new(url_db.connect_pool().await.map_err(deployment)?);
        mapping_store.ensure_schema().await.map_err(deployment)?;
        let counter_store =
            MySqlAccessCounterStore::new(analytics_db.connect_pool().await.map_err(deployment)?);
        counter_store.ensure_schema().await.map_err(deployment)?;

        let publisher = Arc::new(
            RedisEventChannel::new(
                RedisChannelConfig::builder()
                    .url(redis_url.as_str())
                    .service_name(beacon_url_management::SERVICE_NAME)
                    .build(),
            )
            .map_err(deployment)?,
        );
        publisher.connect().await.map_err(deployment)?;

        let consumer = Arc::new(
            RedisEventChannel::new(
                RedisChannelConfig::builder()
                    .url(redis_url.as_str())
                    .service_name(beacon_analytics::SERVICE_NAME)
                    .poll_interval(Duration::from_millis(20))
                    .redelivery_interval(Duration::from_millis(500))
                    .build(),
            )
            .map_err(deployment)?,
        );
        consumer.connect().await.map_err(deployment)?;

        let analytics: Arc<dyn Analytics> = Arc::new(AnalyticsService::new(counter_store));
        consumer
            .subscribe_to::<UrlAccessedEvent, _>(AccessEventHandler::new(analytics.clone()))
            .await
            .map_err(deployment)?;

        let url_listener = bind().await?;
        let url_management_addr = url_listener.local_addr().map_err(deployment)?;
        let url_management_url = format!("http://{url_management_addr}");
        let url_management = UrlManagementService::new(
            mapping_store,
            publisher.clone(),
            url_management_url.as_str(),
        );
        let url_router = beacon_url_management::http::router(
            beacon_url_management::http::AppState::new(Arc::new(url_management)),
        );

        let analytics_listener = bind().await?;
        let analytics_addr = analytics_listener.local_addr().map_err(deployment)?;
        let analytics_router = beacon_analytics::http::router(
            beacon_analytics::http::AppState::new(analytics),
        );

        let servers = vec![
            spawn_server("url-management", url_listener, url_router),
            spawn_server("analytics", analytics_listener, analytics_router),
        ];
        info!(%url_management_addr, %analytics_addr, "local deployment started");

        let harness = NetworkedHarness::connect(
            NetworkedConfig::builder()
                .url_management_url(url_management_url)
                .analytics_url(format!("http://{analytics_addr}"))
                .url_management_mysql_dsn(url_dsn)
                .analytics_mysql_dsn(analytics_dsn)
                .redis_url(redis_url)
                .build(),
        )
        .await?;

        Ok(Self {
            harness,
            url_management_addr,
            analytics_addr,
            servers,
            _channels: vec![publisher, consumer],
            _url_db: url_db,
            _analytics_db: analytics_db,
            _redis: redis,
        })
    }

    pub fn harness(&self) -> &NetworkedHarness {
        &self.harness
    }

    pub fn url_management_addr(&self) -> SocketAddr {
        self.url_management_addr
    }

    pub fn analytics_addr(&self) -> SocketAddr {
        self.analytics_addr
    }
}

impl Drop for LocalDeployment {
    fn drop(&mut self) {
        for server in self.servers.drain(..) {
            server.abort();
        }
    }
}

fn deployment(err: impl std::fmt::Display) -> HarnessError {
    HarnessError::Deployment(err.to_string())
}

async fn bind() -> HarnessResult<TcpListener> {
    TcpListener::bind("127.0.0.1:0").await.map_err(deployment)
}

fn spawn_server(name: &'static str, listener: TcpListener, router: Router) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            warn!(service = name, error = %err, "server stopped");
        }
    })
}
