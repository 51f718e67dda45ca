// ABOUTME: Small shared helpers for the replication engine
// ABOUTME: Time-based delay primitive used between poll rounds and phases

use std::time::Duration;

/// Suspend the current task for `duration`. Zero returns immediately.
pub async fn wait(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    tracing::trace!("waiting {:?}", duration);
    tokio::time::sleep(duration).await;
}

/// Milliseconds elapsed since `start`, saturating at `u64::MAX`.
pub fn elapsed_ms(start: std::time::Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
