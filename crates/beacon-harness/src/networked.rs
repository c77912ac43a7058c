use crate::error::{HarnessError, HarnessResult};
use crate::harness::TestHarness;
use async_trait::async_trait;
use beacon_analytics::{TopUrl, TopUrlsResponse};
use beacon_channel::redis::{FIELD_EVENT_TYPE, FIELD_PAYLOAD, FIELD_ROUTING_KEY};
use beacon_core::{DomainEvent, EventEnvelope, UrlAccessedEvent};
use beacon_url_management::ShortenedUrl;
use redis::aio::ConnectionManager;
use redis::streams::StreamRangeReply;
use reqwest::{header, redirect, Response, StatusCode};
use serde::Deserialize;
use serde::Serialize;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Endpoints of a running url-management/analytics pair and the
/// infrastructure behind them.
#[derive(Debug, Clone, TypedBuilder)]
pub struct NetworkedConfig {
    #[builder(setter(into))]
    pub url_management_url: String,
    #[builder(setter(into))]
    pub analytics_url: String,
    #[builder(setter(into))]
    pub url_management_mysql_dsn: String,
    #[builder(setter(into))]
    pub analytics_mysql_dsn: String,
    #[builder(setter(into))]
    pub redis_url: String,
    #[builder(default = "beacon".to_string(), setter(into))]
    pub exchange: String,
    #[builder(default = Duration::from_millis(50))]
    pub poll_interval: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShortenBody<'a> {
    long_url: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Deserialize)]
struct ErrorInfo {
    code: String,
    message: String,
}

/// Drives the services over HTTP and inspects their storage directly.
pub struct NetworkedHarness {
    config: NetworkedConfig,
    http: reqwest::Client,
    redis: ConnectionManager,
    url_db: MySqlPool,
    analytics_db: MySqlPool,
    stream_key: String,
}

impl NetworkedHarness {
    pub async fn connect(config: NetworkedConfig) -> HarnessResult<Self> {
        // Redirects are the response under test, not something to follow.
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        let redis = ConnectionManager::new(redis::Client::open(config.redis_url.as_str())?).await?;
        let url_db = MySqlPoolOptions::new()
            .max_connections(2)
            .connect(&config.url_management_mysql_dsn)
            .await?;
        let analytics_db = MySqlPoolOptions::new()
            .max_connections(2)
            .connect(&config.analytics_mysql_dsn)
            .await?;
        let stream_key = format!("{}:{}", config.exchange, UrlAccessedEvent::ROUTING_KEY);

        Ok(Self {
            config,
            http,
            redis,
            url_db,
            analytics_db,
            stream_key,
        })
    }

    pub fn config(&self) -> &NetworkedConfig {
        &self.config
    }

    fn url_management(&self, path: &str) -> String {
        format!("{}{}", self.config.url_management_url.trim_end_matches('/'), path)
    }

    fn analytics(&self, path: &str) -> String {
        format!("{}{}", self.config.analytics_url.trim_end_matches('/'), path)
    }

    /// Total entries ever appended to the stream, unaffected by trimming.
    async fn entries_added(&self) -> HarnessResult<u64> {
        let mut conn = self.redis.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(&self.stream_key)
            .query_async(&mut conn)
            .await?;
        if !exists {
            return Ok(0);
        }

        let info: HashMap<String, redis::Value> = redis::cmd("XINFO")
            .arg("STREAM")
            .arg(&self.stream_key)
            .query_async(&mut conn)
            .await?;
        match info.get("entries-added") {
            Some(redis::Value::Int(added)) => Ok(u64::try_from(*added).unwrap_or_default()),
            other => Err(HarnessError::Unexpected(format!(
                "XINFO STREAM without entries-added: {other:?}"
            ))),
        }
    }

    async fn counted_accesses(&self) -> HarnessResult<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(access_count), 0) AS SIGNED) FROM url_access_stats",
        )
        .fetch_one(&self.analytics_db)
        .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }
}

/// Turns a non-success response into the matching tagged error.
async fn error_from(response: Response) -> HarnessError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => return err.into(),
    };
    let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&body) else {
        return HarnessError::Unexpected(format!("{status}: {body}"));
    };

    match error.code.as_str() {
        "invalid_url" => HarnessError::InvalidUrl(error.message),
        "url_not_found" => HarnessError::UrlNotFound(error.message),
        "invalid_limit" => HarnessError::InvalidLimit(error.message),
        code => HarnessError::Unexpected(format!("{status} {code}: {}", error.message)),
    }
}

#[async_trait]
impl TestHarness for NetworkedHarness {
    async fn shorten_url(&self, long_url: &str) -> HarnessResult<ShortenedUrl> {
        let response = self
            .http
            .post(self.url_management("/urls"))
            .json(&ShortenBody { long_url })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
            _ => Err(error_from(response).await),
        }
    }

    async fn resolve_url(&self, short_code: &str) -> HarnessResult<String> {
        let response = self
            .http
            .get(self.url_management(&format!("/{short_code}")))
            .send()
            .await?;

        if response.status() != StatusCode::MOVED_PERMANENTLY {
            return Err(error_from(response).await);
        }
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|location| location.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| HarnessError::Unexpected("redirect without a Location header".into()))
    }

    async fn get_top_urls(&self, limit: i64) -> HarnessResult<Vec<TopUrl>> {
        let response = self
            .http
            .get(self.analytics("/stats/top"))
            .query(&[("limit", limit)])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(error_from(response).await);
        }
        let body: TopUrlsResponse = response.json().await?;
        Ok(body.urls)
    }

    async fn get_published_events(&self) -> HarnessResult<Vec<UrlAccessedEvent>> {
        let mut conn = self.redis.clone();
        let reply: StreamRangeReply = redis::cmd("XRANGE")
            .arg(&self.stream_key)
            .arg("-")
            .arg("+")
            .query_async(&mut conn)
            .await?;

        let mut events = Vec::with_capacity(reply.ids.len());
        for entry in reply.ids {
            let (Some(event_type), Some(routing_key), Some(payload)) = (
                entry.get::<String>(FIELD_EVENT_TYPE),
                entry.get::<String>(FIELD_ROUTING_KEY),
                entry.get::<String>(FIELD_PAYLOAD),
            ) else {
                return Err(HarnessError::Unexpected(format!(
                    "malformed stream entry {}",
                    entry.id
                )));
            };
            if event_type != UrlAccessedEvent::EVENT_TYPE {
                continue;
            }
            let envelope = EventEnvelope {
                event_type,
                routing_key,
                payload,
            };
            events.push(envelope.decode::<UrlAccessedEvent>()?);
        }
        Ok(events)
    }

    async fn wait_for_events_processed(&self, timeout: Duration) -> HarnessResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let published = self.entries_added().await?;
            let counted = self.counted_accesses().await?;
            trace!(published, counted, "waiting for analytics");
            if counted >= published {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(HarnessError::Timeout(format!(
                    "{counted} of {published} events counted after {timeout:?}"
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn reset(&self) -> HarnessResult<()> {
        sqlx::query("DELETE FROM url_mappings")
            .execute(&self.url_db)
            .await?;
        sqlx::query("DELETE FROM url_access_stats")
            .execute(&self.analytics_db)
            .await?;

        // Consumers recreate their group on the next read.
        let mut conn = self.redis.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(&self.stream_key)
            .query_async(&mut conn)
            .await?;

        debug!(stream = %self.stream_key, "networked state reset");
        Ok(())
    }
}
