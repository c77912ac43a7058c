use beacon_analytics::SERVICE_NAME;
use beacon_telemetry::LogFormat;
use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "BEACON_ANALYTICS_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "BEACON_ANALYTICS_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "BEACON_ANALYTICS_MYSQL_DSN";
pub const SERVICE_NAME_ENV: &str = "BEACON_ANALYTICS_SERVICE_NAME";
pub const REDIS_URL_ENV: &str = "BEACON_REDIS_URL";
pub const EXCHANGE_ENV: &str = "BEACON_EXCHANGE";
pub const LOG_FORMAT_ENV: &str = "BEACON_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8002";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_EXCHANGE: &str = "beacon";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "beacon-analytics")]
pub struct Cli {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = REDIS_URL_ENV, default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    #[arg(long, env = EXCHANGE_ENV, default_value = DEFAULT_EXCHANGE)]
    pub exchange: String,

    /// Prefix of the durable queue this instance consumes from. Instances
    /// sharing a name share the work.
    #[arg(long, env = SERVICE_NAME_ENV, default_value = SERVICE_NAME)]
    pub service_name: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,
}
