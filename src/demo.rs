// ABOUTME: Demonstration scenario replicating three company records between in-memory stores
// ABOUTME: Exercises single-batch sync, paged sync and change polling with checkable outcomes

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::BatchSynchronizer;
use crate::error::SyncResult;
use crate::poller::ChangePoller;
use crate::record::{Fields, Filter, RecordId};
use crate::sink::{DeliveryCounter, StoreSink};
use crate::store::{MemoryStore, RecordStore};
use crate::utils::wait;

const COMPANIES: [(&str, &str, u64); 3] = [
    ("GE", "test", 1_000_000),
    ("Exxon", "test2", 5_000_000),
    ("Google", "test3", 5_000_001),
];

/// Result of one scenario step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub label: String,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn new(label: &str, passed: bool, detail: String) -> Self {
        Self {
            label: label.to_string(),
            passed,
            detail,
        }
    }
}

/// Insert the three sample companies, `spacing` apart.
pub async fn seed_companies<S: RecordStore>(
    store: &S,
    spacing: Duration,
) -> SyncResult<Vec<RecordId>> {
    let mut ids = Vec::with_capacity(COMPANIES.len());
    for (i, (name, owner, amount)) in COMPANIES.iter().enumerate() {
        if i > 0 {
            wait(spacing).await;
        }
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name));
        fields.insert("owner".into(), json!(owner));
        fields.insert("amount".into(), json!(amount));
        ids.push(store.insert(fields).await?);
    }
    Ok(ids)
}

/// Change the owner of the named company.
pub async fn touch<S: RecordStore>(store: &S, name: &str) -> SyncResult<u64> {
    let mut patch = Fields::new();
    patch.insert("owner".into(), json!("test4"));
    store.update(&Filter::field("name", name), &patch).await
}

/// Empty both stores.
pub async fn reset(source: &MemoryStore, target: &MemoryStore) -> SyncResult<()> {
    source.clear().await?;
    target.clear().await?;
    Ok(())
}

/// Run the three-step scenario and report each check.
pub async fn run_scenario(spacing: Duration) -> SyncResult<Vec<Check>> {
    let source = Arc::new(MemoryStore::new("source"));
    let target = Arc::new(MemoryStore::new("target"));
    let mut checks = Vec::new();

    seed_companies(source.as_ref(), spacing).await?;
    let counter = DeliveryCounter::new();
    let sink = Arc::new(StoreSink::new(Arc::clone(&target), counter.clone()));
    let cursor = BatchSynchronizer::new(Arc::clone(&source), sink)
        .sync_all_no_paging()
        .await?;
    checks.push(Check::new(
        "1. synchronized all records in a single batch",
        counter.get() == 1 && cursor.len() == COMPANIES.len(),
        format!("{} deliveries, {} records", counter.get(), cursor.len()),
    ));

    reset(&source, &target).await?;
    seed_companies(source.as_ref(), spacing).await?;

    let counter = DeliveryCounter::new();
    let sink = Arc::new(StoreSink::new(Arc::clone(&target), counter.clone()));
    let cursor = BatchSynchronizer::new(Arc::clone(&source), Arc::clone(&sink))
        .sync_all(2)
        .await?;
    let names: Vec<String> = cursor
        .seen()
        .iter()
        .filter_map(|r| r.field("name").and_then(|v| v.as_str()).map(String::from))
        .collect();
    let in_order = names.iter().map(String::as_str).eq(COMPANIES.iter().map(|c| c.0));
    checks.push(Check::new(
        "2. synchronized all records in pages of 2",
        counter.get() == 2 && in_order,
        format!("{} deliveries, records {:?}", counter.get(), names),
    ));

    let counter = DeliveryCounter::new();
    let sink = Arc::new(StoreSink::new(Arc::clone(&target), counter.clone()));
    let before = cursor.clone();
    wait(spacing).await;
    touch(source.as_ref(), "GE").await?;

    let (cursor, _) = ChangePoller::new(Arc::clone(&source), sink, Duration::ZERO)
        .poll_once(cursor)
        .await?;
    let current = source.find_one(&Filter::field("name", "GE")).await?;
    let refreshed = current.is_some_and(|ge| ge.updated_at == cursor.seen()[0].updated_at);
    let others_untouched = cursor.seen()[1..] == before.seen()[1..];
    checks.push(Check::new(
        "3. synchronized only the changed record",
        counter.get() == 1 && refreshed && others_untouched,
        format!("{} deliveries", counter.get()),
    ));

    Ok(checks)
}
