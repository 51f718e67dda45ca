// ABOUTME: SyncCursor tracks paging progress and every record delivered by a run
// ABOUTME: Updates consume the cursor and return the next value instead of mutating shared state

use serde::{Deserialize, Serialize};

use crate::error::{CursorResult, SyncError, SyncFailure};
use crate::record::Record;

/// Progress of one synchronization run.
///
/// `seen` is in delivery order. It only grows while pages are synced and is
/// never resized by polling, which replaces entries one at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    page_index: u64,
    seen: Vec<Record>,
}

impl SyncCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages already processed.
    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    pub fn seen(&self) -> &[Record] {
        &self.seen
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Append a delivered page to `seen`. Does not move `page_index`.
    pub fn with_page(mut self, records: Vec<Record>) -> Self {
        self.seen.extend(records);
        self
    }

    /// Move on to the next page.
    pub fn advance(mut self) -> Self {
        self.page_index += 1;
        self
    }

    /// Replace the cached copy at `index` with a refreshed record.
    pub fn with_replaced(mut self, index: usize, record: Record) -> CursorResult<Self> {
        let Some(slot) = self.seen.get_mut(index) else {
            let error = SyncError::InvalidArgument(format!(
                "cursor index {} out of range for {} seen records",
                index,
                self.seen.len()
            ));
            return Err(SyncFailure::new(self, error));
        };
        *slot = record;
        Ok(self)
    }
}
