//! Unit-of-work shaped repository ports.
//!
//! Every operation runs inside a session opened with `begin()`. Writes
//! staged in a session are invisible to every other session until
//! `commit()`; dropping a session without committing discards them.

use crate::error::StorageResult;
use crate::model::{NewUrlMapping, UrlAccessStats, UrlMapping};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;

#[async_trait]
pub trait UrlMappingStore: Send + Sync + 'static {
    async fn begin(&self) -> StorageResult<Box<dyn UrlMappingTx>>;
}

#[async_trait]
pub trait UrlMappingTx: Send {
    async fn find_by_short_code(&mut self, code: &ShortCode) -> StorageResult<Option<UrlMapping>>;

    async fn find_by_long_url(&mut self, long_url: &str) -> StorageResult<Option<UrlMapping>>;

    /// Stages a new mapping. Returns `Err(Conflict)` if either the short
    /// code or the long URL is already taken. Conflicts may also surface
    /// from `commit` when another session won the race.
    async fn save(&mut self, mapping: NewUrlMapping) -> StorageResult<UrlMapping>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;
}

#[async_trait]
pub trait AccessCounterStore: Send + Sync + 'static {
    async fn begin(&self) -> StorageResult<Box<dyn AccessCounterTx>>;
}

#[async_trait]
pub trait AccessCounterTx: Send {
    /// Atomically creates the record with a count of one, or increments the
    /// existing count by one. `last_accessed_at` never moves backwards.
    async fn increment_access_count(
        &mut self,
        code: &ShortCode,
        long_url: &str,
        accessed_at: Timestamp,
    ) -> StorageResult<()>;

    async fn find_by_short_code(
        &mut self,
        code: &ShortCode,
    ) -> StorageResult<Option<UrlAccessStats>>;

    /// Returns at most `limit` records ordered by `access_count` descending,
    /// ties broken by insertion order.
    async fn top_by_access_count(&mut self, limit: usize) -> StorageResult<Vec<UrlAccessStats>>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
