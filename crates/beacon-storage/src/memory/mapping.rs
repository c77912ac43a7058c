use async_trait::async_trait;
use beacon_core::error::{StorageError, StorageResult};
use beacon_core::model::{NewUrlMapping, UrlMapping};
use beacon_core::repository::{UrlMappingStore, UrlMappingTx};
use beacon_core::shortcode::ShortCode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct MappingTable {
    by_code: HashMap<String, UrlMapping>,
    code_by_long_url: HashMap<String, String>,
}

impl MappingTable {
    fn conflict(&self, code: &ShortCode, long_url: &str) -> Option<StorageError> {
        if self.by_code.contains_key(code.as_str()) {
            return Some(StorageError::Conflict(format!("short code '{code}'")));
        }
        if self.code_by_long_url.contains_key(long_url) {
            return Some(StorageError::Conflict(format!("long url '{long_url}'")));
        }
        None
    }

    fn insert(&mut self, mapping: UrlMapping) {
        self.code_by_long_url
            .insert(mapping.long_url.clone(), mapping.short_code.as_str().to_owned());
        self.by_code
            .insert(mapping.short_code.as_str().to_owned(), mapping);
    }
}

/// In-memory implementation of [`UrlMappingStore`].
///
/// Clones share the same table, so a clone behaves like a second connection
/// pool onto the same database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUrlMappingStore {
    table: Arc<Mutex<MappingTable>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryUrlMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed mappings.
    pub fn len(&self) -> usize {
        self.table.lock().by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UrlMappingStore for InMemoryUrlMappingStore {
    async fn begin(&self) -> StorageResult<Box<dyn UrlMappingTx>> {
        Ok(Box::new(InMemoryUrlMappingTx {
            table: self.table.clone(),
            next_id: self.next_id.clone(),
            staged: Vec::new(),
        }))
    }
}

struct InMemoryUrlMappingTx {
    table: Arc<Mutex<MappingTable>>,
    next_id: Arc<AtomicI64>,
    staged: Vec<UrlMapping>,
}

#[async_trait]
impl UrlMappingTx for InMemoryUrlMappingTx {
    async fn find_by_short_code(&mut self, code: &ShortCode) -> StorageResult<Option<UrlMapping>> {
        trace!(short_code = %code, "looking up mapping by short code");
        if let Some(staged) = self.staged.iter().find(|m| &m.short_code == code) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.table.lock().by_code.get(code.as_str()).cloned())
    }

    async fn find_by_long_url(&mut self, long_url: &str) -> StorageResult<Option<UrlMapping>> {
        if let Some(staged) = self.staged.iter().find(|m| m.long_url == long_url) {
            return Ok(Some(staged.clone()));
        }
        let table = self.table.lock();
        Ok(table
            .code_by_long_url
            .get(long_url)
            .and_then(|code| table.by_code.get(code))
            .cloned())
    }

    async fn save(&mut self, mapping: NewUrlMapping) -> StorageResult<UrlMapping> {
        if self
            .staged
            .iter()
            .any(|m| m.short_code == mapping.short_code || m.long_url == mapping.long_url)
        {
            return Err(StorageError::Conflict(format!(
                "short code '{}' staged twice",
                mapping.short_code
            )));
        }
        if let Some(err) = self
            .table
            .lock()
            .conflict(&mapping.short_code, &mapping.long_url)
        {
            return Err(err);
        }

        let saved = UrlMapping {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            short_code: mapping.short_code,
            long_url: mapping.long_url,
            created_at: mapping.created_at,
        };
        self.staged.push(saved.clone());
        Ok(saved)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let Self { table, staged, .. } = *self;
        let mut table = table.lock();
        // Another session may have committed the same code or URL since `save`.
        for mapping in &staged {
            if let Some(err) = table.conflict(&mapping.short_code, &mapping.long_url) {
                return Err(err);
            }
        }
        for mapping in staged {
            trace!(short_code = %mapping.short_code, "committing mapping");
            table.insert(mapping);
        }
        Ok(())
    }
}
