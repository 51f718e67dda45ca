// ABOUTME: Test double wrapping MemoryStore with switchable per-operation failures
// ABOUTME: Lets tests drive store access errors into the synchronizer and poller

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{MemoryStore, RecordStore};
use crate::error::{SyncError, SyncResult};
use crate::record::{Fields, Filter, FindOptions, Record, RecordId};

#[derive(Debug, Default)]
pub(crate) struct Failures {
    pub find: AtomicBool,
    pub find_one: AtomicBool,
    pub count: AtomicBool,
}

/// A `MemoryStore` whose reads can be made to fail on demand.
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    pub failures: Failures,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new("flaky"),
            failures: Failures::default(),
        }
    }

    fn check(flag: &AtomicBool, operation: &'static str) -> SyncResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(SyncError::store(operation, "connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn insert(&self, fields: Fields) -> SyncResult<RecordId> {
        self.inner.insert(fields).await
    }

    async fn upsert(&self, record: Record) -> SyncResult<()> {
        self.inner.upsert(record).await
    }

    async fn find(&self, filter: &Filter, options: FindOptions) -> SyncResult<Vec<Record>> {
        Self::check(&self.failures.find, "find")?;
        self.inner.find(filter, options).await
    }

    async fn find_one(&self, filter: &Filter) -> SyncResult<Option<Record>> {
        Self::check(&self.failures.find_one, "find_one")?;
        self.inner.find_one(filter).await
    }

    async fn update(&self, filter: &Filter, patch: &Fields) -> SyncResult<u64> {
        self.inner.update(filter, patch).await
    }

    async fn remove(&self, filter: &Filter, multi: bool) -> SyncResult<u64> {
        self.inner.remove(filter, multi).await
    }

    async fn count(&self, filter: &Filter) -> SyncResult<u64> {
        Self::check(&self.failures.count, "count")?;
        self.inner.count(filter).await
    }
}
