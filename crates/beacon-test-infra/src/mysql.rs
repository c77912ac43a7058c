use crate::{Result, TestInfraError};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone, TypedBuilder)]
pub struct MysqlConfig {
    #[builder(default = "beacon".to_string(), setter(into))]
    database: String,
    #[builder(default = "beacon".to_string(), setter(into))]
    username: String,
    #[builder(default = "beacon".to_string(), setter(into))]
    password: String,
    /// How long [`MySqlServer::connect_pool`] keeps retrying.
    #[builder(default = 30)]
    connect_attempts: usize,
    #[builder(default = Duration::from_millis(500))]
    connect_backoff: Duration,
}

/// A disposable MySQL 8.4 server holding one database.
///
/// The entrypoint logs "ready for connections" once for its temporary
/// bootstrap server and again for the real one, so the wait condition can
/// fire early. Use [`connect_pool`](Self::connect_pool) rather than
/// connecting directly.
pub struct MySqlServer {
    container: ContainerAsync<GenericImage>,
    config: MysqlConfig,
}

impl MySqlServer {
    pub async fn new(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", "8.4")
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .start()
            .await?;

        Ok(Self { container, config })
    }

    /// Starts a server named after `database`, with default credentials.
    pub async fn with_database(database: &str) -> Result<Self> {
        Self::new(MysqlConfig::builder().database(database).build()).await
    }

    pub async fn host(&self) -> Result<String> {
        Ok(self.container.get_host().await?.to_string())
    }

    pub async fn port(&self) -> Result<u16> {
        Ok(self.container.get_host_port_ipv4(MYSQL_PORT).await?)
    }

    pub async fn database_url(&self) -> Result<String> {
        let host = self.host().await?;
        let port = self.port().await?;
        Ok(format!(
            "mysql://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        ))
    }

    /// Opens a pool, retrying until the server accepts connections.
    pub async fn connect_pool(&self) -> Result<MySqlPool> {
        let url = self.database_url().await?;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match MySqlPoolOptions::new().max_connections(8).connect(&url).await {
                Ok(pool) => return Ok(pool),
                Err(err) if attempts >= self.config.connect_attempts => {
                    return Err(TestInfraError::NotReady {
                        attempts,
                        source: err,
                    });
                }
                Err(_) => tokio::time::sleep(self.config.connect_backoff).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = MysqlConfig::builder().database("analytics").build();
        assert_eq!(config.database, "analytics");
        assert_eq!(config.username, "beacon");
        assert_eq!(config.connect_attempts, 30);
    }
}
