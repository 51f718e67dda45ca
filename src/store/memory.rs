// ABOUTME: In-memory RecordStore keeping records in insertion order
// ABOUTME: Stamps strictly increasing timestamps so every mutation is observable

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::RecordStore;
use crate::error::SyncResult;
use crate::record::{strip_reserved, Fields, Filter, FindOptions, Record, RecordId};

#[derive(Debug, Default)]
struct Inner {
    records: Vec<Record>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Inner {
    /// Wall-clock time, bumped past the previous stamp when the clock has not moved.
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// Process-local record store.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Remove every record.
    pub async fn clear(&self) -> SyncResult<u64> {
        self.remove(&Filter::All, true).await
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, fields: Fields) -> SyncResult<RecordId> {
        let mut fields = fields;
        let dropped = strip_reserved(&mut fields);
        if !dropped.is_empty() {
            tracing::warn!(store = %self.name, ?dropped, "ignoring reserved fields on insert");
        }
        let mut inner = self.inner.write().await;
        let stamp = inner.next_stamp();
        let id = RecordId::generate();
        inner.records.push(Record {
            id: id.clone(),
            created_at: stamp,
            updated_at: stamp,
            fields,
        });
        tracing::trace!(store = %self.name, id = %id, "inserted record");
        Ok(id)
    }

    async fn upsert(&self, record: Record) -> SyncResult<()> {
        let mut record = record;
        strip_reserved(&mut record.fields);
        let mut inner = self.inner.write().await;
        match inner.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => inner.records.push(record),
        }
        Ok(())
    }

    async fn find(&self, filter: &Filter, options: FindOptions) -> SyncResult<Vec<Record>> {
        let inner = self.inner.read().await;
        let matching = inner
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .skip(options.skip);
        let records = match options.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        };
        Ok(records)
    }

    async fn find_one(&self, filter: &Filter) -> SyncResult<Option<Record>> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().find(|r| filter.matches(r)).cloned())
    }

    async fn update(&self, filter: &Filter, patch: &Fields) -> SyncResult<u64> {
        let mut patch = patch.clone();
        let dropped = strip_reserved(&mut patch);
        if !dropped.is_empty() {
            tracing::warn!(store = %self.name, ?dropped, "ignoring reserved fields on update");
        }
        let mut inner = self.inner.write().await;
        let stamp = inner.next_stamp();
        let mut updated = 0u64;
        for record in inner.records.iter_mut().filter(|r| filter.matches(r)) {
            for (name, value) in &patch {
                record.fields.insert(name.clone(), value.clone());
            }
            record.updated_at = stamp;
            updated += 1;
        }
        Ok(updated)
    }

    async fn remove(&self, filter: &Filter, multi: bool) -> SyncResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.records.len();
        if multi {
            inner.records.retain(|r| !filter.matches(r));
        } else if let Some(pos) = inner.records.iter().position(|r| filter.matches(r)) {
            inner.records.remove(pos);
        }
        Ok((before - inner.records.len()) as u64)
    }

    async fn count(&self, filter: &Filter) -> SyncResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().filter(|r| filter.matches(r)).count() as u64)
    }
}
