//! Token-bucket rate limiting for one backend (C1, §4.1 "Budget enforcement").
//!
//! Tracks both a token balance (refilled continuously) and a sliding window
//! of request timestamps, matching the source's dual token/request limiter.
//! The source recurses into itself after sleeping for the request-rate
//! limit; here the wait is an explicit loop with a bounded number of
//! iterations, per §9's redesign flag ("self-recursive bucket wait").

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

/// Guards against a misconfigured bucket (e.g. zero refill rate) turning the
/// wait loop in [`TokenBucket::consume`] into an infinite loop.
const MAX_WAIT_ITERATIONS: u32 = 64;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    request_timestamps: Vec<Instant>,
}

/// A token bucket shared across all tasks targeting one backend. Owned by
/// that backend's [`super::RateLimitedClient`], never module-scoped global
/// state (§9 "Global mutable state").
pub struct TokenBucket {
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    max_requests_per_minute: usize,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// `max_tokens_per_minute` sets both the bucket capacity and, divided by
    /// 60, the refill rate — matching the source's
    /// `TokenBucket(MAX_TOKENS_PER_MIN, MAX_TOKENS_PER_MIN / 60)` construction.
    pub fn new(max_tokens_per_minute: u32, max_requests_per_minute: u32) -> Self {
        let max_tokens = max_tokens_per_minute as f64;
        Self {
            max_tokens,
            refill_rate: max_tokens / 60.0,
            max_requests_per_minute: max_requests_per_minute as usize,
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
                request_timestamps: Vec::new(),
            }),
        }
    }

    /// Wait until `tokens` can be drawn from the bucket without violating
    /// either the per-minute request-count limit or the per-minute token
    /// budget, then draw them and record this request's timestamp.
    ///
    /// The check and the draw happen under the same lock acquisition — the
    /// lock is only ever dropped to `sleep`, never between "no wait needed"
    /// and the decrement, so two concurrent callers can't both pass the
    /// check and both consume (§8 property 5).
    pub async fn consume(&self, tokens: f64) {
        for _ in 0..MAX_WAIT_ITERATIONS {
            let mut state = self.state.lock().await;
            self.refill(&mut state);

            let now = Instant::now();
            state
                .request_timestamps
                .retain(|ts| now.duration_since(*ts) < Duration::from_secs(60));

            let wait = if state.request_timestamps.len() >= self.max_requests_per_minute {
                let oldest = state.request_timestamps[0];
                let elapsed = now.duration_since(oldest);
                let remaining = Duration::from_secs(60).saturating_sub(elapsed);
                if remaining > Duration::ZERO {
                    Some(remaining)
                } else {
                    None
                }
            } else if tokens > state.tokens {
                let deficit = tokens - state.tokens;
                Some(Duration::from_secs_f64(deficit / self.refill_rate))
            } else {
                None
            };

            let Some(delay) = wait else {
                state.tokens -= tokens;
                state.request_timestamps.push(now);
                return;
            };

            drop(state);
            sleep(delay).await;
        }

        // Budget exhausted: draw anyway rather than silently drop the
        // caller's request. The bucket may go into deficit but the wait
        // loop already ran MAX_WAIT_ITERATIONS rounds of backoff.
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens -= tokens;
        state.request_timestamps.push(Instant::now());
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        state.last_refill = now;
    }

    #[cfg(test)]
    async fn current_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }
}
