// ABOUTME: BatchSynchronizer - full sync of the source store in fixed-size pages
// ABOUTME: Each page is delivered once and appended to the run's cursor for later polling

use std::sync::Arc;

use crate::cursor::SyncCursor;
use crate::error::{CursorResult, SyncError, SyncFailure, SyncResult};
use crate::record::{Filter, FindOptions};
use crate::sink::{EventSink, Payload};
use crate::store::RecordStore;

/// Walks the whole source store page by page and forwards every page to the sink.
///
/// Pages are addressed by skip/limit over the store's insertion order, so the
/// cursor alone is enough to resume a run from its last completed page. Every
/// paging operation hands the cursor back on failure for that purpose.
pub struct BatchSynchronizer<S: RecordStore, K: EventSink> {
    source: Arc<S>,
    sink: Arc<K>,
}

impl<S: RecordStore, K: EventSink> BatchSynchronizer<S, K> {
    pub fn new(source: Arc<S>, sink: Arc<K>) -> Self {
        Self { source, sink }
    }

    /// Fetch the page at `cursor.page_index()` and deliver it, even if empty.
    ///
    /// Returns the cursor with the page appended to `seen`. Advancing the page
    /// index is left to the caller. On failure the cursor comes back unchanged.
    pub async fn sync_page(&self, page_size: usize, cursor: SyncCursor) -> CursorResult<SyncCursor> {
        let skip = match page_offset(page_size, cursor.page_index()) {
            Ok(skip) => skip,
            Err(e) => return Err(SyncFailure::new(cursor, e)),
        };

        let records = match self
            .source
            .find(&Filter::All, FindOptions::page(skip, page_size))
            .await
        {
            Ok(records) => records,
            Err(e) => return Err(SyncFailure::new(cursor, e)),
        };

        tracing::debug!(
            page = cursor.page_index(),
            skip,
            records = records.len(),
            "syncing page"
        );

        if let Err(e) = self.sink.deliver(Payload::Batch(records.clone())).await {
            return Err(SyncFailure::new(cursor, e));
        }
        Ok(cursor.with_page(records))
    }

    /// Full sync from an empty cursor.
    pub async fn sync_all(&self, page_size: usize) -> CursorResult<SyncCursor> {
        self.sync_from(page_size, SyncCursor::new()).await
    }

    /// Continue a full sync from `cursor`, e.g. the one carried by a [`SyncFailure`].
    ///
    /// The record count is read once up front. Records inserted while paging
    /// past the snapshot are not picked up by this run.
    pub async fn sync_from(&self, page_size: usize, cursor: SyncCursor) -> CursorResult<SyncCursor> {
        if let Err(e) = ensure_page_size(page_size) {
            return Err(SyncFailure::new(cursor, e));
        }

        let total = match self.source.count(&Filter::All).await {
            Ok(total) => total,
            Err(e) => {
                tracing::error!("Full sync could not count source records: {}", e);
                return Err(SyncFailure::new(cursor, e));
            }
        };
        let pages = total.div_ceil(page_size as u64);

        tracing::info!(
            "Starting full sync: {} records in {} pages of {} (from page {})",
            total,
            pages,
            page_size,
            cursor.page_index()
        );

        let mut cursor = cursor;
        while cursor.page_index() < pages {
            let page = cursor.page_index();
            cursor = self.sync_page(page_size, cursor).await.inspect_err(|f| {
                tracing::error!("Full sync failed on page {}: {}", page, f.error);
            })?;
            cursor = cursor.advance();
        }

        tracing::info!(
            "Completed full sync: {} records delivered in {} pages",
            cursor.len(),
            cursor.page_index()
        );
        Ok(cursor)
    }

    /// Deliver the entire store as a single batch.
    ///
    /// Only suitable when the downstream accepts unbounded payloads; use
    /// [`sync_all`](Self::sync_all) otherwise.
    pub async fn sync_all_no_paging(&self) -> SyncResult<SyncCursor> {
        let records = self.source.find(&Filter::All, FindOptions::default()).await?;
        tracing::info!("Syncing {} records in a single batch", records.len());

        self.sink.deliver(Payload::Batch(records.clone())).await?;
        Ok(SyncCursor::new().with_page(records).advance())
    }
}

fn ensure_page_size(page_size: usize) -> SyncResult<()> {
    if page_size == 0 {
        return Err(SyncError::InvalidArgument(
            "page size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Number of records before page `page_index`.
fn page_offset(page_size: usize, page_index: u64) -> SyncResult<usize> {
    ensure_page_size(page_size)?;
    usize::try_from(page_index)
        .ok()
        .and_then(|index| index.checked_mul(page_size))
        .ok_or_else(|| {
            SyncError::InvalidArgument(format!(
                "page {} of size {} is beyond the addressable range",
                page_index, page_size
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Fields, Record, RecordId};
    use crate::sink::{DeliveryCounter, StoreSink};
    use crate::store::flaky::FlakyStore;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    /// Sink that records each payload size and can fail on a chosen delivery.
    #[derive(Default)]
    struct RecordingSink {
        sizes: Mutex<Vec<usize>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn deliver(&self, payload: Payload) -> SyncResult<()> {
            let mut sizes = self.sizes.lock().unwrap();
            sizes.push(payload.len());
            if self.fail_on == Some(sizes.len()) {
                return Err(SyncError::sink(
                    "target rejected write",
                    SyncError::store("upsert", "unavailable"),
                ));
            }
            Ok(())
        }

        async fn retract(&self, _id: &RecordId) -> SyncResult<u64> {
            Ok(0)
        }

        fn deliveries(&self) -> u64 {
            self.sizes.lock().unwrap().len() as u64
        }
    }

    async fn source_with(n: usize) -> Arc<MemoryStore> {
        let store = MemoryStore::new("source");
        for i in 0..n {
            let mut fields = Fields::new();
            fields.insert("n".into(), json!(i));
            store.insert(fields).await.unwrap();
        }
        Arc::new(store)
    }

    fn positions(records: &[Record]) -> Vec<i64> {
        records
            .iter()
            .map(|r| r.field("n").and_then(|v| v.as_i64()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_sync_all_pages_every_record_once() {
        for (n, page_size, expected) in [
            (7, 3, vec![3, 3, 1]),
            (6, 3, vec![3, 3]),
            (3, 1, vec![1, 1, 1]),
            (2, 5, vec![2]),
        ] {
            let sink = Arc::new(RecordingSink::default());
            let sync = BatchSynchronizer::new(source_with(n).await, Arc::clone(&sink));

            let cursor = sync.sync_all(page_size).await.unwrap();

            assert_eq!(*sink.sizes.lock().unwrap(), expected);
            assert_eq!(cursor.page_index(), expected.len() as u64);
            assert_eq!(positions(cursor.seen()), (0..n as i64).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_sync_all_empty_store_delivers_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let sync = BatchSynchronizer::new(source_with(0).await, Arc::clone(&sink));

        let cursor = sync.sync_all(2).await.unwrap();
        assert!(cursor.is_empty());
        assert_eq!(cursor.page_index(), 0);
        assert_eq!(sink.deliveries(), 0);
    }

    #[tokio::test]
    async fn test_sync_page_does_not_advance() {
        let sink = Arc::new(RecordingSink::default());
        let sync = BatchSynchronizer::new(source_with(4).await, Arc::clone(&sink));

        let cursor = sync.sync_page(2, SyncCursor::new()).await.unwrap();
        assert_eq!(cursor.page_index(), 0);
        assert_eq!(cursor.len(), 2);

        // Past the end still delivers, just an empty page.
        let cursor = cursor.advance().advance().advance();
        let cursor = sync.sync_page(2, cursor).await.unwrap();
        assert_eq!(cursor.len(), 2);
        assert_eq!(*sink.sizes.lock().unwrap(), vec![2, 0]);
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let sync = BatchSynchronizer::new(source_with(1).await, Arc::clone(&sink));

        let failure = sync.sync_all(0).await.unwrap_err();
        assert!(matches!(failure.error, SyncError::InvalidArgument(_)));
        assert!(failure.cursor.is_empty());
        assert_eq!(sink.deliveries(), 0);
    }

    #[tokio::test]
    async fn test_page_offset_overflow_rejected() {
        assert_eq!(page_offset(3, 4).unwrap(), 12);
        assert!(matches!(
            page_offset(2, u64::MAX),
            Err(SyncError::InvalidArgument(_))
        ));

        let sink = Arc::new(RecordingSink::default());
        let sync = BatchSynchronizer::new(source_with(1).await, Arc::clone(&sink));
        let far: SyncCursor =
            serde_json::from_value(json!({ "page_index": u64::MAX, "seen": [] })).unwrap();

        let failure = sync.sync_page(2, far.clone()).await.unwrap_err();
        assert!(matches!(failure.error, SyncError::InvalidArgument(_)));
        assert_eq!(failure.cursor, far);
        assert_eq!(sink.deliveries(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_aborts_and_resume_finishes() {
        let source = source_with(5).await;
        let failing = Arc::new(RecordingSink {
            sizes: Mutex::new(Vec::new()),
            fail_on: Some(2),
        });
        let sync = BatchSynchronizer::new(Arc::clone(&source), Arc::clone(&failing));
        let failure = sync.sync_all(2).await.unwrap_err();
        assert!(failure.error.is_sink_write());
        assert_eq!(failing.deliveries(), 2);

        // Page 0 went through; the failed page 1 was not appended.
        assert_eq!(failure.cursor.page_index(), 1);
        assert_eq!(positions(failure.cursor.seen()), vec![0, 1]);

        let sink = Arc::new(RecordingSink::default());
        let resumed = BatchSynchronizer::new(source, Arc::clone(&sink));
        let cursor = resumed.sync_from(2, failure.cursor).await.unwrap();
        assert_eq!(*sink.sizes.lock().unwrap(), vec![2, 1]);
        assert_eq!(cursor.page_index(), 3);
        assert_eq!(positions(cursor.seen()), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_count_failure_surfaces_store_error() {
        let source = Arc::new(FlakyStore::new());
        source.inner.insert(Fields::new()).await.unwrap();
        source.failures.count.store(true, Ordering::SeqCst);
        let sink = Arc::new(RecordingSink::default());
        let sync = BatchSynchronizer::new(source, Arc::clone(&sink));

        let failure = sync.sync_all(2).await.unwrap_err();
        assert!(failure.error.is_store_access());
        assert_eq!(failure.cursor, SyncCursor::new());
        assert_eq!(sink.deliveries(), 0);
    }

    #[tokio::test]
    async fn test_find_failure_mid_run_keeps_completed_pages() {
        let source = Arc::new(FlakyStore::new());
        for i in 0..4 {
            let mut fields = Fields::new();
            fields.insert("n".into(), json!(i));
            source.inner.insert(fields).await.unwrap();
        }

        /// Breaks the source's reads once the first page has been delivered.
        struct TrippingSink {
            source: Arc<FlakyStore>,
        }

        #[async_trait]
        impl EventSink for TrippingSink {
            async fn deliver(&self, _payload: Payload) -> SyncResult<()> {
                self.source.failures.find.store(true, Ordering::SeqCst);
                Ok(())
            }

            async fn retract(&self, _id: &RecordId) -> SyncResult<u64> {
                Ok(0)
            }

            fn deliveries(&self) -> u64 {
                0
            }
        }

        let sink = Arc::new(TrippingSink {
            source: Arc::clone(&source),
        });
        let sync = BatchSynchronizer::new(Arc::clone(&source), sink);

        let failure = sync.sync_all(2).await.unwrap_err();
        assert!(matches!(
            failure.error,
            SyncError::StoreAccess { operation: "find", .. }
        ));
        assert_eq!(failure.cursor.page_index(), 1);
        assert_eq!(positions(failure.cursor.seen()), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_sync_all_no_paging_single_batch() {
        let target = Arc::new(MemoryStore::new("target"));
        let counter = DeliveryCounter::new();
        let sink = Arc::new(StoreSink::new(Arc::clone(&target), counter.clone()));
        let sync = BatchSynchronizer::new(source_with(3).await, sink);

        let cursor = sync.sync_all_no_paging().await.unwrap();
        assert_eq!(counter.get(), 1);
        assert_eq!(cursor.len(), 3);
        assert_eq!(target.count(&Filter::All).await.unwrap(), 3);
    }

    /// Sink that inserts a new source record on every delivery.
    struct GrowingSink {
        source: Arc<MemoryStore>,
    }

    #[async_trait]
    impl EventSink for GrowingSink {
        async fn deliver(&self, _payload: Payload) -> SyncResult<()> {
            self.source.insert(Fields::new()).await?;
            Ok(())
        }

        async fn retract(&self, _id: &RecordId) -> SyncResult<u64> {
            Ok(0)
        }

        fn deliveries(&self) -> u64 {
            0
        }
    }

    #[tokio::test]
    async fn test_count_snapshot_ignores_concurrent_inserts() {
        let source = source_with(2).await;
        let sink = Arc::new(GrowingSink {
            source: Arc::clone(&source),
        });
        let sync = BatchSynchronizer::new(Arc::clone(&source), sink);

        let cursor = sync.sync_all(1).await.unwrap();
        assert_eq!(cursor.page_index(), 2);
        assert_eq!(positions(cursor.seen()), vec![0, 1]);
        assert_eq!(source.count(&Filter::All).await.unwrap(), 4);
    }
}
