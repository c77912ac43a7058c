mod cli;

use crate::cli::{Cli, StorageBackendArg};
use anyhow::Context;
use beacon_analytics::http::{router, AppState};
use beacon_analytics::{AccessEventHandler, Analytics, AnalyticsService};
use beacon_channel::{ChannelError, EventChannel, EventChannelExt, RedisChannelConfig, RedisEventChannel};
use beacon_core::UrlAccessedEvent;
use beacon_storage::{AccessCounterStore, InMemoryAccessCounterStore, MySqlAccessCounterStore};
use beacon_telemetry::TelemetryConfig;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse();

    beacon_telemetry::init(
        &TelemetryConfig::builder()
            .service_name(config.service_name.as_str())
            .format(config.log_format.into())
            .build(),
    )?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        exchange = %config.exchange,
        service_name = %config.service_name,
        "starting analytics service"
    );

    match config.storage {
        StorageBackendArg::InMemory => serve(&config, InMemoryAccessCounterStore::new()).await,
        StorageBackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlAccessCounterStore::connect(dsn).await?;
            store.ensure_schema().await?;
            serve(&config, store).await
        }
    }
}

async fn serve<S: AccessCounterStore>(config: &Cli, store: S) -> anyhow::Result<()> {
    let analytics: Arc<dyn Analytics> = Arc::new(AnalyticsService::new(store));

    let channel = Arc::new(RedisEventChannel::new(
        RedisChannelConfig::builder()
            .url(config.redis_url.as_str())
            .service_name(config.service_name.as_str())
            .exchange(config.exchange.as_str())
            .build(),
    )?);
    consume_or_degrade(channel.clone(), AccessEventHandler::new(analytics.clone())).await;

    let app = router(AppState::new(analytics));
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "analytics listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    channel.shutdown();
    Ok(())
}

async fn start_consuming(
    channel: &RedisEventChannel,
    handler: AccessEventHandler,
) -> Result<(), ChannelError> {
    channel.connect().await?;
    channel
        .subscribe_to::<UrlAccessedEvent, _>(handler)
        .await
}

/// Rankings stay queryable while the broker is down; consumption starts as
/// soon as a connection succeeds.
async fn consume_or_degrade(channel: Arc<RedisEventChannel>, handler: AccessEventHandler) {
    let Err(err) = start_consuming(&channel, handler.clone()).await else {
        info!("consuming access events");
        return;
    };
    warn!(error = %err, "broker unavailable, access events will be consumed once it is reachable");

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(RECONNECT_INTERVAL).await;
            match start_consuming(&channel, handler.clone()).await {
                Ok(()) => {
                    info!("broker connection established, consuming access events");
                    return;
                }
                Err(err) => warn!(error = %err, "broker still unavailable"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
