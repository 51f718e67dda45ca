// ABOUTME: Error taxonomy for the replication engine
// ABOUTME: Store access and sink write failures abort the current page or poll round

use thiserror::Error;

use crate::cursor::SyncCursor;
use crate::record::RecordId;

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for operations that thread a cursor.
pub type CursorResult<T> = Result<T, SyncFailure>;

/// Errors raised by the synchronizer, poller, and their collaborators.
///
/// Nothing here is retried internally. The first error surfaces to the caller
/// of the enclosing operation, which decides whether to resume or re-run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A record store operation failed (connectivity, bad filter, poisoned state).
    #[error("store {operation} failed: {message}")]
    StoreAccess {
        operation: &'static str,
        message: String,
    },

    /// The event sink could not write the payload to the target.
    #[error("sink write failed: {message}")]
    SinkWrite {
        message: String,
        #[source]
        source: Option<Box<SyncError>>,
    },

    /// A previously seen record no longer exists in the source.
    #[error("record {id} not found")]
    NotFound { id: RecordId },

    /// The caller passed an argument the engine cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SyncError {
    pub fn store(operation: &'static str, message: impl Into<String>) -> Self {
        Self::StoreAccess {
            operation,
            message: message.into(),
        }
    }

    /// Wrap a failure raised while writing to the target.
    pub fn sink(message: impl Into<String>, source: SyncError) -> Self {
        Self::SinkWrite {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_store_access(&self) -> bool {
        matches!(self, SyncError::StoreAccess { .. })
    }

    pub fn is_sink_write(&self) -> bool {
        matches!(self, SyncError::SinkWrite { .. })
    }
}

/// A failed cursor operation, carrying the cursor as it stood when the error hit.
///
/// During full sync the failing page is never appended, so `cursor.page_index()`
/// is the page to resume from. During polling, entries refreshed before the
/// error keep their new values.
#[derive(Error, Debug)]
#[error("stopped at page {} with {} records seen: {error}", .cursor.page_index(), .cursor.len())]
pub struct SyncFailure {
    pub cursor: SyncCursor,
    pub error: SyncError,
}

impl SyncFailure {
    pub fn new(cursor: SyncCursor, error: SyncError) -> Self {
        Self { cursor, error }
    }
}

impl From<SyncFailure> for SyncError {
    fn from(failure: SyncFailure) -> Self {
        failure.error
    }
}
