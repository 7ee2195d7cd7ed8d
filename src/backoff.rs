//! Fixed backoff table with jitter; terminal-failure rule (spec §4.D).
//!
//! Grounded on the teacher's `BackoffConfig`/`next_backoff` shape, but the
//! exponential-multiplier formula is replaced by the spec's fixed
//! powers-of-4 table, and the teacher's dependency-free LCG jitter is
//! replaced by a true uniform `rand::Rng` draw — the spec's Open Questions
//! explicitly call out that a degenerate jitter source "never flips sign"
//! and must be a real ±30% uniform draw.

use chrono::Duration;
use rand::Rng;

/// Attempts are 1-based; `table[t-1]` is the delay in seconds for attempt `t`.
pub const BACKOFF_TABLE_SECS: [u64; 12] = [
    1, 4, 16, 64, 256, 1024, 4096, 16384, 65536, 262144, 1_048_576, 4_194_304,
];

/// After this many delivery attempts without success, a task is moved to
/// `dead` instead of being rescheduled.
pub const MAX_RETRIES: u32 = 12;

/// Compute `next_run = now + jitter(table[t-1])` for failed attempt `t`
/// (1-based). Jitter is a uniform multiplicative factor in `[0.70, 1.30]`.
///
/// Panics if `attempt` is 0 or exceeds the table length — callers must check
/// `tries + 1 < MAX_RETRIES` before calling this (§4.D terminal rule).
pub fn next_backoff(attempt: u32) -> Duration {
    next_backoff_with_rng(attempt, &mut rand::thread_rng())
}

pub fn next_backoff_with_rng(attempt: u32, rng: &mut impl Rng) -> Duration {
    let base_secs = BACKOFF_TABLE_SECS[(attempt - 1) as usize] as f64;
    let jitter_factor = rng.gen_range(0.70..=1.30);
    let secs = base_secs * jitter_factor;
    Duration::milliseconds((secs * 1000.0) as i64)
}

/// `true` once the just-completed attempt (`tries`, already post-increment)
/// has reached `MAX_RETRIES` — the task goes straight to `dead` rather than
/// scheduling a 13th retry. This pins down the off-by-one ambiguity noted in
/// spec §9: "on the twelfth failed attempt ... go straight to dead", and
/// matches the invariant in §3.1 that `tries == maxRetries` after a failed
/// attempt moves the task to `dead`.
pub fn is_exhausted(tries: u32) -> bool {
    tries >= MAX_RETRIES
}
