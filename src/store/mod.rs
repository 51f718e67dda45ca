// ABOUTME: Record store contract used on both sides of replication
// ABOUTME: Ordered collection with skip/limit queries, filtered updates and removals

#[cfg(test)]
pub(crate) mod flaky;
pub mod memory;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::record::{Fields, Filter, FindOptions, Record, RecordId};

pub use memory::MemoryStore;

/// An ordered collection of records.
///
/// Implementations must return records in insertion order so that repeated
/// paging over an unchanged store yields identical pages. Every mutating call
/// refreshes the `updated_at` of the records it touches, except `upsert`,
/// which mirrors a record written elsewhere and keeps its timestamps.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record and return its assigned identifier.
    async fn insert(&self, fields: Fields) -> SyncResult<RecordId>;

    /// Write `record` by identifier, replacing any existing copy in place.
    async fn upsert(&self, record: Record) -> SyncResult<()>;

    /// Records matching `filter` in insertion order, paginated by `options`.
    async fn find(&self, filter: &Filter, options: FindOptions) -> SyncResult<Vec<Record>>;

    /// First record matching `filter`, if any.
    async fn find_one(&self, filter: &Filter) -> SyncResult<Option<Record>>;

    /// Set the fields in `patch` on every matching record. Returns the number updated.
    async fn update(&self, filter: &Filter, patch: &Fields) -> SyncResult<u64>;

    /// Remove matching records; only the first match unless `multi`. Returns the number removed.
    async fn remove(&self, filter: &Filter, multi: bool) -> SyncResult<u64>;

    /// Number of records matching `filter`.
    async fn count(&self, filter: &Filter) -> SyncResult<u64>;
}
