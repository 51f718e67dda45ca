// ABOUTME: Event sink delivering records or batches to the replication target
// ABOUTME: Counts one delivery per call through an injected per-run counter

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::record::{Filter, Record, RecordId};
use crate::store::RecordStore;

/// What a single delivery carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    One(Record),
    Batch(Vec<Record>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::One(_) => 1,
            Payload::Batch(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_records(self) -> Vec<Record> {
        match self {
            Payload::One(record) => vec![record],
            Payload::Batch(records) => records,
        }
    }
}

/// Shared delivery counter. Clones observe the same value.
///
/// Observability only; nothing in the engine branches on it.
#[derive(Debug, Clone, Default)]
pub struct DeliveryCounter(Arc<AtomicU64>);

impl DeliveryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Downstream side of replication.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver a record or a batch. A batch counts as one delivery.
    async fn deliver(&self, payload: Payload) -> SyncResult<()>;

    /// Remove a record from the target by identifier. Returns the number removed.
    async fn retract(&self, id: &RecordId) -> SyncResult<u64>;

    /// Deliveries attempted so far.
    fn deliveries(&self) -> u64;
}

/// Sink that upserts delivered records into a target store.
pub struct StoreSink<T: RecordStore> {
    target: Arc<T>,
    counter: DeliveryCounter,
}

impl<T: RecordStore> StoreSink<T> {
    pub fn new(target: Arc<T>, counter: DeliveryCounter) -> Self {
        Self { target, counter }
    }
}

#[async_trait]
impl<T: RecordStore> EventSink for StoreSink<T> {
    async fn deliver(&self, payload: Payload) -> SyncResult<()> {
        self.counter.increment();
        let size = payload.len();
        tracing::debug!(
            delivery = self.counter.get(),
            records = size,
            "delivering payload"
        );

        for record in payload.into_records() {
            let id = record.id.clone();
            self.target.upsert(record).await.map_err(|e| {
                SyncError::sink(
                    format!("failed to write record {} of a {}-record payload", id, size),
                    e,
                )
            })?;
        }
        Ok(())
    }

    async fn retract(&self, id: &RecordId) -> SyncResult<u64> {
        self.target
            .remove(&Filter::id(id), false)
            .await
            .map_err(|e| SyncError::sink(format!("failed to remove record {}", id), e))
    }

    fn deliveries(&self) -> u64 {
        self.counter.get()
    }
}
