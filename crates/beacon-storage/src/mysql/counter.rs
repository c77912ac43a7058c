use super::{map_sqlx_error, parse_millis};
use async_trait::async_trait;
use beacon_core::error::StorageResult;
use beacon_core::model::UrlAccessStats;
use beacon_core::repository::{AccessCounterStore, AccessCounterTx};
use beacon_core::shortcode::ShortCode;
use jiff::Timestamp;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, Row, Transaction};
use tracing::trace;

const SCHEMA: &str = include_str!("../../ddl/mysql/url_access_stats.sql");

/// MySQL implementation of [`AccessCounterStore`].
///
/// Increments are a single `INSERT ... ON DUPLICATE KEY UPDATE`, so the
/// read-modify-write happens inside the storage engine under the row lock.
#[derive(Debug, Clone)]
pub struct MySqlAccessCounterStore {
    pool: MySqlPool,
}

impl MySqlAccessCounterStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Creates the `url_access_stats` table if it does not exist.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl AccessCounterStore for MySqlAccessCounterStore {
    async fn begin(&self) -> StorageResult<Box<dyn AccessCounterTx>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(MySqlAccessCounterTx { tx }))
    }
}

struct MySqlAccessCounterTx {
    tx: Transaction<'static, MySql>,
}

fn row_to_stats(row: &MySqlRow) -> StorageResult<UrlAccessStats> {
    let id: i64 = row.try_get("id").map_err(map_sqlx_error)?;
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let access_count: u64 = row.try_get("access_count").map_err(map_sqlx_error)?;
    let last_accessed_at: Option<i64> = row.try_get("last_accessed_at").map_err(map_sqlx_error)?;

    Ok(UrlAccessStats {
        id,
        short_code: ShortCode::new_unchecked(short_code),
        long_url,
        access_count,
        last_accessed_at: last_accessed_at
            .map(|millis| parse_millis("last_accessed_at", millis))
            .transpose()?,
    })
}

#[async_trait]
impl AccessCounterTx for MySqlAccessCounterTx {
    async fn increment_access_count(
        &mut self,
        code: &ShortCode,
        long_url: &str,
        accessed_at: Timestamp,
    ) -> StorageResult<()> {
        trace!(short_code = %code, "upserting access counter");
        sqlx::query(
            r#"
            INSERT INTO url_access_stats (short_code, long_url, access_count, last_accessed_at)
            VALUES (?, ?, 1, ?) AS incoming
            ON DUPLICATE KEY UPDATE
                access_count = url_access_stats.access_count + 1,
                last_accessed_at = GREATEST(
                    COALESCE(url_access_stats.last_accessed_at, incoming.last_accessed_at),
                    incoming.last_accessed_at
                )
            "#,
        )
        .bind(code.as_str())
        .bind(long_url)
        .bind(accessed_at.as_millisecond())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_short_code(
        &mut self,
        code: &ShortCode,
    ) -> StorageResult<Option<UrlAccessStats>> {
        let row = sqlx::query(
            r#"
            SELECT id, short_code, long_url, access_count, last_accessed_at
            FROM url_access_stats
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_stats).transpose()
    }

    async fn top_by_access_count(&mut self, limit: usize) -> StorageResult<Vec<UrlAccessStats>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT id, short_code, long_url, access_count, last_accessed_at
            FROM url_access_stats
            ORDER BY access_count DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_stats).collect()
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}
