// ABOUTME: Library root for record-replicator
// ABOUTME: Batched full sync plus timestamp-based change polling between record stores

pub mod batch;
pub mod config;
pub mod cursor;
pub mod demo;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod record;
pub mod sink;
pub mod store;
pub mod utils;

pub use batch::BatchSynchronizer;
pub use config::ReplicatorConfig;
pub use cursor::SyncCursor;
pub use error::{CursorResult, SyncError, SyncFailure, SyncResult};
pub use orchestrator::{SyncReport, Synchronizer};
pub use poller::{ChangePoller, MissingRecordPolicy, PollStats};
pub use record::{Fields, Filter, FindOptions, Record, RecordId};
pub use sink::{DeliveryCounter, EventSink, Payload, StoreSink};
pub use store::{MemoryStore, RecordStore};
