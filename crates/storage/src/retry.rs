use std::time::Duration;

/// Timeout and retry settings for ledger round-trips.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per round-trip, including the first one.
    pub attempts: u32,
    /// Deadline for a single `get`/`set`/`compare_and_set` call.
    pub round_trip_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Read-modify-write passes before giving up on a contended key.
    /// Only used with ledgers that support compare-and-set.
    pub cas_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            round_trip_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            cas_attempts: 16,
        }
    }
}

/// One step of exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Sleep duration in milliseconds (includes jitter).
    pub sleep_ms: u64,
    /// Base backoff for the next step.
    pub next_backoff_ms: u64,
}

/// Exponential backoff with additive jitter, bounded by `max_backoff_ms`.
///
/// Jitter is `jitter_seed` reduced into `0..=current/2`.
pub fn compute_backoff(current_backoff_ms: u64, max_backoff_ms: u64, jitter_seed: u64) -> Backoff {
    let max_jitter = current_backoff_ms.saturating_div(2).saturating_add(1);
    let jitter = jitter_seed % max_jitter;
    let sleep_ms = current_backoff_ms.saturating_add(jitter).min(max_backoff_ms);
    let next_backoff_ms = current_backoff_ms.saturating_mul(2).min(max_backoff_ms);
    Backoff {
        sleep_ms,
        next_backoff_ms,
    }
}
