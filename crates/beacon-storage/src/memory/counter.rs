use async_trait::async_trait;
use beacon_core::error::StorageResult;
use beacon_core::model::UrlAccessStats;
use beacon_core::repository::{AccessCounterStore, AccessCounterTx};
use beacon_core::shortcode::ShortCode;
use dashmap::DashMap;
use jiff::Timestamp;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone)]
struct CounterRow {
    id: i64,
    long_url: String,
    access_count: u64,
    last_accessed_at: Option<Timestamp>,
}

impl CounterRow {
    fn to_stats(&self, code: &str) -> UrlAccessStats {
        UrlAccessStats {
            id: self.id,
            short_code: ShortCode::new_unchecked(code),
            long_url: self.long_url.clone(),
            access_count: self.access_count,
            last_accessed_at: self.last_accessed_at,
        }
    }
}

#[derive(Debug)]
struct StagedAccess {
    code: String,
    long_url: String,
    accessed_at: Timestamp,
}

/// In-memory implementation of [`AccessCounterStore`] backed by `DashMap`.
///
/// Increments are applied on commit through the per-shard entry lock, so
/// concurrent sessions never lose an update. Reads inside a session observe
/// committed state only.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccessCounterStore {
    rows: Arc<DashMap<String, CounterRow>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryAccessCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all committed access counts.
    pub fn total_access_count(&self) -> u64 {
        self.rows.iter().map(|row| row.access_count).sum()
    }
}

#[async_trait]
impl AccessCounterStore for InMemoryAccessCounterStore {
    async fn begin(&self) -> StorageResult<Box<dyn AccessCounterTx>> {
        Ok(Box::new(InMemoryAccessCounterTx {
            rows: self.rows.clone(),
            next_id: self.next_id.clone(),
            staged: Vec::new(),
        }))
    }
}

struct InMemoryAccessCounterTx {
    rows: Arc<DashMap<String, CounterRow>>,
    next_id: Arc<AtomicI64>,
    staged: Vec<StagedAccess>,
}

#[async_trait]
impl AccessCounterTx for InMemoryAccessCounterTx {
    async fn increment_access_count(
        &mut self,
        code: &ShortCode,
        long_url: &str,
        accessed_at: Timestamp,
    ) -> StorageResult<()> {
        self.staged.push(StagedAccess {
            code: code.as_str().to_owned(),
            long_url: long_url.to_owned(),
            accessed_at,
        });
        Ok(())
    }

    async fn find_by_short_code(
        &mut self,
        code: &ShortCode,
    ) -> StorageResult<Option<UrlAccessStats>> {
        Ok(self
            .rows
            .get(code.as_str())
            .map(|row| row.to_stats(code.as_str())))
    }

    async fn top_by_access_count(&mut self, limit: usize) -> StorageResult<Vec<UrlAccessStats>> {
        let mut ranked: Vec<UrlAccessStats> = self
            .rows
            .iter()
            .map(|entry| entry.value().to_stats(entry.key()))
            .collect();
        ranked.sort_by_key(|stats| (Reverse(stats.access_count), stats.id));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let Self {
            rows,
            next_id,
            staged,
        } = *self;

        for access in staged {
            trace!(short_code = %access.code, "applying access increment");
            rows.entry(access.code)
                .and_modify(|row| {
                    row.access_count += 1;
                    row.last_accessed_at = row
                        .last_accessed_at
                        .max(Some(access.accessed_at));
                })
                .or_insert_with(|| CounterRow {
                    id: next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    long_url: access.long_url,
                    access_count: 1,
                    last_accessed_at: Some(access.accessed_at),
                });
        }
        Ok(())
    }
}
