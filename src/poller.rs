// ABOUTME: ChangePoller - re-checks previously synced records and re-delivers changed ones
// ABOUTME: Compares cached timestamps against the source for a fixed number of rounds

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cursor::SyncCursor;
use crate::error::{CursorResult, SyncError, SyncFailure, SyncResult};
use crate::record::{Filter, Record, RecordId};
use crate::sink::{EventSink, Payload};
use crate::store::RecordStore;
use crate::utils::wait;

/// What to do when a record seen during full sync is gone from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingRecordPolicy {
    /// Log it and leave target and cursor untouched.
    #[default]
    Skip,
    /// Remove it from the target too. The cursor entry stays.
    Retract,
    /// Abort the round with [`SyncError::NotFound`].
    Fail,
}

/// Counters from one or more poll rounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub rounds: u32,
    pub checked: u64,
    pub redelivered: u64,
    pub missing: u64,
}

impl PollStats {
    fn absorb(&mut self, round: &PollStats) {
        self.rounds += round.rounds;
        self.checked += round.checked;
        self.redelivered += round.redelivered;
        self.missing += round.missing;
    }
}

enum Check {
    Unchanged,
    Missing,
    Changed(Record),
}

/// Detects changes to already-synced records by timestamp comparison.
///
/// Any timestamp change counts, including writes that left the payload as it
/// was. Content is never diffed.
pub struct ChangePoller<S: RecordStore, K: EventSink> {
    source: Arc<S>,
    sink: Arc<K>,
    interval: Duration,
    on_missing: MissingRecordPolicy,
}

impl<S: RecordStore, K: EventSink> ChangePoller<S, K> {
    pub fn new(source: Arc<S>, sink: Arc<K>, interval: Duration) -> Self {
        Self {
            source,
            sink,
            interval,
            on_missing: MissingRecordPolicy::default(),
        }
    }

    pub fn with_missing_policy(mut self, policy: MissingRecordPolicy) -> Self {
        self.on_missing = policy;
        self
    }

    async fn check(&self, cached: &Record) -> SyncResult<Check> {
        let Some(fresh) = self.source.find_one(&Filter::id(&cached.id)).await? else {
            return Ok(Check::Missing);
        };
        if !cached.is_stale_against(&fresh) {
            return Ok(Check::Unchanged);
        }
        tracing::debug!(
            id = %cached.id,
            cached = %cached.updated_at,
            current = %fresh.updated_at,
            "record changed, re-delivering"
        );
        Ok(Check::Changed(fresh))
    }

    async fn handle_missing(&self, id: &RecordId) -> SyncResult<()> {
        match self.on_missing {
            MissingRecordPolicy::Skip => {
                tracing::warn!("Record {} no longer exists in source, skipping", id);
            }
            MissingRecordPolicy::Retract => {
                let removed = self.sink.retract(id).await?;
                tracing::warn!(
                    "Record {} no longer exists in source, retracted {} from target",
                    id,
                    removed
                );
            }
            MissingRecordPolicy::Fail => {
                return Err(SyncError::NotFound { id: id.clone() });
            }
        }
        Ok(())
    }

    async fn redeliver(&self, fresh: &Record) -> SyncResult<()> {
        self.sink.retract(&fresh.id).await?;
        self.sink.deliver(Payload::One(fresh.clone())).await
    }

    /// One pass over every record in `cursor.seen()`.
    ///
    /// A changed record is removed from the target, delivered again on its
    /// own, and replaces the cached copy in the returned cursor. On failure the
    /// returned cursor keeps the entries refreshed earlier in the round.
    pub async fn poll_once(&self, cursor: SyncCursor) -> CursorResult<(SyncCursor, PollStats)> {
        let mut cursor = cursor;
        let mut stats = PollStats {
            rounds: 1,
            ..PollStats::default()
        };

        for index in 0..cursor.len() {
            stats.checked += 1;
            let cached = &cursor.seen()[index];
            let outcome = match self.check(cached).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(SyncFailure::new(cursor, e)),
            };

            match outcome {
                Check::Unchanged => {
                    tracing::trace!(id = %cached.id, "record unchanged");
                }
                Check::Missing => {
                    stats.missing += 1;
                    let id = cached.id.clone();
                    if let Err(e) = self.handle_missing(&id).await {
                        return Err(SyncFailure::new(cursor, e));
                    }
                }
                Check::Changed(fresh) => {
                    if let Err(e) = self.redeliver(&fresh).await {
                        return Err(SyncFailure::new(cursor, e));
                    }
                    cursor = cursor.with_replaced(index, fresh)?;
                    stats.redelivered += 1;
                }
            }
        }

        Ok((cursor, stats))
    }

    /// Run exactly `rounds` poll rounds with the configured delay between them.
    ///
    /// This is a fixed budget, not a watch. Callers wanting continuous
    /// replication start another loop with the returned cursor.
    pub async fn poll_loop(
        &self,
        rounds: u32,
        cursor: SyncCursor,
    ) -> CursorResult<(SyncCursor, PollStats)> {
        let mut cursor = cursor;
        let mut total = PollStats::default();

        for round in 1..=rounds {
            if round > 1 {
                wait(self.interval).await;
            }

            let (next, stats) = self.poll_once(cursor).await.inspect_err(|f| {
                tracing::error!("Poll round {}/{} failed: {}", round, rounds, f.error);
            })?;
            cursor = next;
            tracing::info!(
                "Poll round {}/{}: {} checked, {} re-delivered, {} missing",
                round,
                rounds,
                stats.checked,
                stats.redelivered,
                stats.missing
            );
            total.absorb(&stats);
        }

        Ok((cursor, total))
    }
}
