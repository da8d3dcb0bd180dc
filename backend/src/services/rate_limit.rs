//! Rate limiting for buyer writes
//!
//! Per-key token buckets. A bucket starts full at `capacity`. Whole tokens are
//! earned at `refill_per_second` since the last refill, and the refill mark
//! only moves when at least one token is added. Time comes from a `governor`
//! clock so tests can drive it by hand.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock, FakeRelativeClock, Reference};
use uuid::Uuid;

use crate::config::RateLimitConfig;
use crate::error::{AppError, AppResult};

/// Clock that only moves when told to
#[derive(Debug, Clone, Default)]
pub struct ManualClock(FakeRelativeClock);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.0.advance(by);
    }
}

enum LimiterClock {
    System {
        clock: DefaultClock,
        start: <DefaultClock as Clock>::Instant,
    },
    Manual {
        clock: FakeRelativeClock,
        start: <FakeRelativeClock as Clock>::Instant,
    },
}

impl LimiterClock {
    fn system() -> Self {
        let clock = DefaultClock::default();
        let start = clock.now();
        Self::System { clock, start }
    }

    fn manual(clock: &ManualClock) -> Self {
        let clock = clock.0.clone();
        let start = clock.now();
        Self::Manual { clock, start }
    }

    /// Time since the limiter was built
    fn elapsed(&self) -> Duration {
        match self {
            Self::System { clock, start } => Duration::from(clock.now().duration_since(*start)),
            Self::Manual { clock, start } => Duration::from(clock.now().duration_since(*start)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: u32,
    last_refill: Duration,
}

/// Per-key write limiter
pub struct RateLimiter {
    capacity: u32,
    refill_per_second: f64,
    clock: LimiterClock,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_per_second: f64) -> Self {
        Self::build(capacity, refill_per_second, LimiterClock::system())
    }

    /// Limiter driven by a manual clock
    pub fn with_clock(capacity: u32, refill_per_second: f64, clock: &ManualClock) -> Self {
        Self::build(capacity, refill_per_second, LimiterClock::manual(clock))
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_per_second)
    }

    fn build(capacity: u32, refill_per_second: f64, clock: LimiterClock) -> Self {
        let capacity = if capacity == 0 {
            tracing::warn!("Rate limit capacity must be positive, using 1");
            1
        } else {
            capacity
        };
        let refill_per_second = if refill_per_second.is_finite() && refill_per_second > 0.0 {
            refill_per_second
        } else {
            tracing::warn!(refill_per_second, "Invalid refill rate, using 1/s");
            1.0
        };

        Self {
            capacity,
            refill_per_second,
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Key for create requests
    pub fn create_key(actor_id: Uuid) -> String {
        actor_id.to_string()
    }

    /// Key for update requests: actor plus client address
    pub fn update_key(actor_id: Uuid, client_addr: Option<&str>) -> String {
        format!("{}:{}", actor_id, client_addr.unwrap_or("unknown"))
    }

    /// Consume one request for `key` if allowed
    pub fn check(&self, key: &str) -> bool {
        let now = self.clock.elapsed();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let idle = now.saturating_sub(bucket.last_refill);
        let earned = (idle.as_secs_f64() * self.refill_per_second).floor();
        if earned >= 1.0 {
            let room = f64::from(self.capacity - bucket.tokens);
            bucket.tokens += earned.min(room) as u32;
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Like `check`, but denial is an error
    pub fn enforce(&self, key: &str) -> AppResult<()> {
        if self.check(key) {
            Ok(())
        } else {
            tracing::warn!(key, "Rate limit exceeded");
            Err(AppError::RateLimited)
        }
    }
}
