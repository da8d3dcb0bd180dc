//! Rate limiter tests
//!
//! Token-bucket behaviour under a manual clock:
//! - Burst allowance equals capacity
//! - Whole-token refill over time, measured from the last refill
//! - Independent keys

use std::sync::Arc;
use std::time::Duration;

use buyer_leads_backend::services::{ManualClock, RateLimiter};
use proptest::prelude::*;

fn limiter(capacity: u32, rate: f64) -> (RateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (RateLimiter::with_clock(capacity, rate, &clock), clock)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_idle_key_refills_to_capacity_only() {
        let (limiter, clock) = limiter(10, 1.0);
        for _ in 0..10 {
            assert!(limiter.check("actor"));
        }
        assert!(!limiter.check("actor"));

        clock.advance(Duration::from_secs(3600));
        let allowed = (0..20).filter(|_| limiter.check("actor")).count();
        assert_eq!(allowed, 10);
    }

    #[test]
    fn test_fractional_progress_accumulates() {
        let (limiter, clock) = limiter(1, 1.0);
        assert!(limiter.check("actor"));

        clock.advance(Duration::from_millis(600));
        assert!(!limiter.check("actor"));
        clock.advance(Duration::from_millis(600));
        assert!(limiter.check("actor"));
    }

    #[test]
    fn test_refill_resets_progress() {
        let (limiter, clock) = limiter(10, 1.0);
        while limiter.check("actor") {}

        clock.advance(Duration::from_millis(1500));
        assert!(limiter.check("actor"));
        clock.advance(Duration::from_millis(500));
        assert!(!limiter.check("actor"));
    }

    #[test]
    fn test_update_keys_separate_addresses() {
        let actor = uuid::Uuid::new_v4();
        assert_ne!(
            RateLimiter::update_key(actor, Some("10.0.0.1")),
            RateLimiter::update_key(actor, Some("10.0.0.2"))
        );
        assert_eq!(
            RateLimiter::update_key(actor, None),
            format!("{}:unknown", actor)
        );
        assert_ne!(RateLimiter::create_key(actor), RateLimiter::update_key(actor, None));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        /// A burst of n requests admits exactly min(n, capacity)
        #[test]
        fn prop_burst_admits_capacity(capacity in 1u32..30, n in 0usize..60) {
            let (limiter, _clock) = limiter(capacity, 1.0);
            let allowed = (0..n).filter(|_| limiter.check("actor")).count();
            prop_assert_eq!(allowed, n.min(capacity as usize));
        }

        /// Exhausting one key leaves every other key untouched
        #[test]
        fn prop_keys_are_independent(capacity in 1u32..20, other in "[a-z]{1,8}") {
            prop_assume!(other != "actor");
            let (limiter, _clock) = limiter(capacity, 1.0);
            while limiter.check("actor") {}

            let allowed = (0..capacity).filter(|_| limiter.check(&other)).count();
            prop_assert_eq!(allowed, capacity as usize);
        }

        /// After an empty bucket idles for s whole seconds, min(s, capacity)
        /// requests pass
        #[test]
        fn prop_refill_after_idle(capacity in 1u32..20, secs in 0u64..40) {
            let (limiter, clock) = limiter(capacity, 1.0);
            while limiter.check("actor") {}

            clock.advance(Duration::from_secs(secs));
            let allowed = (0..capacity + 5).filter(|_| limiter.check("actor")).count();
            prop_assert_eq!(allowed, (secs as usize).min(capacity as usize));
        }
    }
}
