//! Process-wide token-bucket rate limiter.
//!
//! One bucket for the whole process, not per client: the simulator's job is
//! to let consumers exercise their 429 handling, not to police tenants. The
//! bucket refills to capacity once per window. The mutex guards only the
//! counter math and is never held across I/O.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token bucket with whole-bucket refill.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    state: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    window_started: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            state: Mutex::new(Bucket {
                tokens: capacity,
                window_started: Instant::now(),
            }),
        }
    }

    /// Take one token. On exhaustion returns the seconds until the next
    /// refill, rounded up for the `Retry-After` header.
    pub fn try_acquire(&self) -> Result<(), u64> {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> Result<(), u64> {
        let mut bucket = match self.state.lock() {
            Ok(guard) => guard,
            // A poisoned counter mutex only means a panic mid-arithmetic;
            // the numbers are still sane enough to keep serving.
            Err(poisoned) => poisoned.into_inner(),
        };

        let elapsed = now.duration_since(bucket.window_started);
        if elapsed >= self.window {
            bucket.tokens = self.capacity;
            bucket.window_started = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            return Ok(());
        }

        let remaining = self.window.saturating_sub(now.duration_since(bucket.window_started));
        Err(remaining.as_secs().max(1))
    }
}
