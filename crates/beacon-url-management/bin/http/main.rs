mod cli;

use crate::cli::{Cli, StorageBackendArg};
use anyhow::Context;
use beacon_channel::{EventChannel, RedisChannelConfig, RedisEventChannel};
use beacon_storage::{InMemoryUrlMappingStore, MySqlUrlMappingStore, UrlMappingStore};
use beacon_telemetry::TelemetryConfig;
use beacon_url_management::http::{router, AppState};
use beacon_url_management::{UrlManagementService, SERVICE_NAME};
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
            .service_name(SERVICE_NAME)
            .format(config.log_format.into())
            .build(),
    )?;

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        exchange = %config.exchange,
        "starting url-management service"
    );

    let channel = Arc::new(RedisEventChannel::new(
        RedisChannelConfig::builder()
            .url(config.redis_url.as_str())
            .service_name(SERVICE_NAME)
            .exchange(config.exchange.as_str())
            .build(),
    )?);
    connect_or_degrade(channel.clone()).await;

    match config.storage {
        StorageBackendArg::InMemory => serve(&config, InMemoryUrlMappingStore::new(), channel).await,
        StorageBackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlUrlMappingStore::connect(dsn).await?;
            store.ensure_schema().await?;
            serve(&config, store, channel).await
        }
    }
}

/// Keeps serving without events while the broker is down, retrying the
/// connection in the background.
async fn connect_or_degrade(channel: Arc<RedisEventChannel>) {
    let Err(err) = channel.connect().await else {
        return;
    };
    warn!(error = %err, "broker unavailable, resolutions will not publish access events");

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(RECONNECT_INTERVAL).await;
            match channel.connect().await {
                Ok(()) => {
                    info!("broker connection established");
                    return;
                }
                Err(err) => warn!(error = %err, "broker still unavailable"),
            }
        }
    });
}

async fn serve<S: UrlMappingStore>(
    config: &Cli,
    store: S,
    channel: Arc<RedisEventChannel>,
) -> anyhow::Result<()> {
    let service = UrlManagementService::new(store, channel, config.base_url.as_str());
    let app = router(AppState::new(Arc::new(service)));

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "url-management listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
