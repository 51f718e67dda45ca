// ABOUTME: Synchronizer - end-to-end replication: full sync, settle, then bounded polling
// ABOUTME: Sequences the two phases and reports what each one delivered

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::BatchSynchronizer;
use crate::config::ReplicatorConfig;
use crate::cursor::SyncCursor;
use crate::error::CursorResult;
use crate::poller::{ChangePoller, PollStats};
use crate::sink::EventSink;
use crate::store::RecordStore;
use crate::utils::{elapsed_ms, wait};

/// Outcome of one replication run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub pages_synced: u64,
    pub records_synced: usize,
    pub poll: PollStats,
    /// Sink deliveries made during this run
    pub deliveries: u64,
    pub duration_ms: u64,
    pub cursor: SyncCursor,
}

/// Entry point for replication from one source store to one sink.
///
/// Runs a paged full sync, waits for the settle delay, then polls the synced
/// records for changes a fixed number of times. There is no recovery here:
/// the first error ends the run and is returned with the cursor reached so far.
pub struct Synchronizer<S: RecordStore, K: EventSink> {
    batch: BatchSynchronizer<S, K>,
    poller: ChangePoller<S, K>,
    sink: Arc<K>,
    settle_delay: Duration,
}

impl<S: RecordStore, K: EventSink> Synchronizer<S, K> {
    pub fn new(source: Arc<S>, sink: Arc<K>, config: &ReplicatorConfig) -> Self {
        let batch = BatchSynchronizer::new(Arc::clone(&source), Arc::clone(&sink));
        let poller = ChangePoller::new(source, Arc::clone(&sink), config.poll_interval())
            .with_missing_policy(config.on_missing);
        Self {
            batch,
            poller,
            sink,
            settle_delay: config.settle_delay(),
        }
    }

    /// Full sync in pages of `page_size`, then `poll_rounds` rounds of change polling.
    pub async fn run(&self, page_size: usize, poll_rounds: u32) -> CursorResult<SyncReport> {
        let start = std::time::Instant::now();
        let deliveries_before = self.sink.deliveries();

        tracing::info!(
            "Starting replication run: page_size={}, poll_rounds={}",
            page_size,
            poll_rounds
        );

        let cursor = self.batch.sync_all(page_size).await?;
        let pages_synced = cursor.page_index();
        let records_synced = cursor.len();

        wait(self.settle_delay).await;

        let (cursor, poll) = self.poller.poll_loop(poll_rounds, cursor).await?;

        let report = SyncReport {
            pages_synced,
            records_synced,
            poll,
            deliveries: self.sink.deliveries() - deliveries_before,
            duration_ms: elapsed_ms(start),
            cursor,
        };

        tracing::info!(
            "Replication run completed: {} records in {} pages, {} re-delivered over {} poll rounds, {} deliveries in {}ms",
            report.records_synced,
            report.pages_synced,
            report.poll.redelivered,
            report.poll.rounds,
            report.deliveries,
            report.duration_ms
        );

        Ok(report)
    }
}
