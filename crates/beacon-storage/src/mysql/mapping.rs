use super::{is_unique_violation, map_sqlx_error, parse_millis};
use async_trait::async_trait;
use beacon_core::error::{StorageError, StorageResult};
use beacon_core::model::{NewUrlMapping, UrlMapping};
use beacon_core::repository::{UrlMappingStore, UrlMappingTx};
use beacon_core::shortcode::ShortCode;
use sha2::{Digest, Sha256};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, Row, Transaction};
use tracing::trace;

const SCHEMA: &str = include_str!("../../ddl/mysql/url_mappings.sql");

/// MySQL implementation of [`UrlMappingStore`].
///
/// Long URLs are unbounded `TEXT`, so uniqueness is enforced on a SHA-256
/// digest column instead of the URL itself.
#[derive(Debug, Clone)]
pub struct MySqlUrlMappingStore {
    pool: MySqlPool,
}

impl MySqlUrlMappingStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Creates the `url_mappings` table if it does not exist.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl UrlMappingStore for MySqlUrlMappingStore {
    async fn begin(&self) -> StorageResult<Box<dyn UrlMappingTx>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(MySqlUrlMappingTx { tx }))
    }
}

struct MySqlUrlMappingTx {
    tx: Transaction<'static, MySql>,
}

fn long_url_digest(long_url: &str) -> String {
    hex::encode(Sha256::digest(long_url.as_bytes()))
}

fn row_to_mapping(row: &MySqlRow) -> StorageResult<UrlMapping> {
    let id: i64 = row.try_get("id").map_err(map_sqlx_error)?;
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(UrlMapping {
        id,
        short_code: ShortCode::new_unchecked(short_code),
        long_url,
        created_at: parse_millis("created_at", created_at)?,
    })
}

#[async_trait]
impl UrlMappingTx for MySqlUrlMappingTx {
    async fn find_by_short_code(&mut self, code: &ShortCode) -> StorageResult<Option<UrlMapping>> {
        trace!(short_code = %code, "looking up mapping by short code");
        let row = sqlx::query(
            r#"
            SELECT id, short_code, long_url, created_at
            FROM url_mappings
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_mapping).transpose()
    }

    async fn find_by_long_url(&mut self, long_url: &str) -> StorageResult<Option<UrlMapping>> {
        let row = sqlx::query(
            r#"
            SELECT id, short_code, long_url, created_at
            FROM url_mappings
            WHERE long_url_digest = ?
            LIMIT 1
            "#,
        )
        .bind(long_url_digest(long_url))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_mapping).transpose()
    }

    async fn save(&mut self, mapping: NewUrlMapping) -> StorageResult<UrlMapping> {
        let result = sqlx::query(
            r#"
            INSERT INTO url_mappings (short_code, long_url, long_url_digest, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(mapping.short_code.as_str())
        .bind(mapping.long_url.as_str())
        .bind(long_url_digest(&mapping.long_url))
        .bind(mapping.created_at.as_millisecond())
        .execute(&mut *self.tx)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => {
                return Err(StorageError::Conflict(format!(
                    "short code '{}' or its long url",
                    mapping.short_code
                )))
            }
            Err(err) => return Err(map_sqlx_error(err)),
        };

        let id = i64::try_from(result.last_insert_id()).map_err(|e| {
            StorageError::InvalidData(format!("auto-increment id out of range: {e}"))
        })?;

        // Truncate to the stored precision.
        let created_at = parse_millis("created_at", mapping.created_at.as_millisecond())?;

        Ok(UrlMapping {
            id,
            short_code: mapping.short_code,
            long_url: mapping.long_url,
            created_at,
        })
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx.commit().await.map_err(|err| {
            if is_unique_violation(&err) {
                StorageError::Conflict(err.to_string())
            } else {
                map_sqlx_error(err)
            }
        })
    }
}
