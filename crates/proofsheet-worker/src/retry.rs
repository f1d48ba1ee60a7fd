//! Retry backoff schedule

use std::time::Duration;

/// Delay before re-enqueue, indexed by the attempt number already used.
pub const BACKOFF_SCHEDULE_SECS: [u64; 5] = [60, 300, 900, 3600, 14400];

/// Backoff for a message that has been retried `attempt` times. Attempts past
/// the end of the table use its last entry.
pub fn backoff_delay(attempt: u32) -> Duration {
    let index = (attempt as usize).min(BACKOFF_SCHEDULE_SECS.len() - 1);
    Duration::from_secs(BACKOFF_SCHEDULE_SECS[index])
}
