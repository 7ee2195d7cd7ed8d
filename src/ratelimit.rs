//! Token-bucket rate limiter shared by all worker deliveries (spec §4.E).
//!
//! Grounded on the teacher's `Mutex`-guarded tracker with async reservation
//! methods (`rate_limits.rs`'s sliding window), generalized here from a
//! per-account sliding window into a single shared token bucket.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Shared token bucket: `capacity` tokens, refilling at `refill_per_sec`.
/// Pause does not empty the bucket — it only prevents dequeue upstream.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec: refill_per_sec as f64,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Reserve exactly one token, sleeping if none is immediately available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                self.refill(&mut state, now);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_capacity_without_sleeping() {
        let limiter = RateLimiter::new(5, 3);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // All 5 tokens were available up front — should be effectively instant.
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn blocks_once_capacity_is_exhausted() {
        let limiter = RateLimiter::new(1, 3);
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        // Refill at 3/sec means ~333ms for the next token.
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
