//! Per-user token-bucket rate limiting.
//!
//! Every authenticated caller gets an independent bucket keyed by uid. A
//! bucket starts full, each admitted request spends one token, and tokens
//! flow back continuously at the configured rate. Buckets are kept for the
//! life of the process: the caller population is the cluster's user base,
//! which is small and bounded, and keeping the bucket preserves a user's
//! spent tokens across quiet periods instead of handing them a fresh burst
//! after sixty idle seconds.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Tuning knobs for [`RateLimiter`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Burst size: tokens in a fresh or fully recovered bucket.
    pub capacity: f64,
    /// Sustained rate, in tokens restored per second.
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 5.0,
            refill_per_sec: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Token-bucket limiter shared by all request handlers.
///
/// Internally a single mutex over the uid-to-bucket map; the critical
/// section is a handful of float operations, so contention is negligible
/// next to the work each request goes on to do.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<u32, Bucket>>,
}

impl RateLimiter {
    /// Creates a limiter with the given tuning.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Spends one token from `uid`'s bucket, admitting the request if one
    /// was available.
    pub fn allow(&self, uid: u32) -> bool {
        self.allow_at(uid, Instant::now())
    }

    fn allow_at(&self, uid: u32, now: Instant) -> bool {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let bucket = buckets.entry(uid).or_insert(Bucket {
            tokens: self.config.capacity,
            refilled_at: now,
        });
        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        bucket.tokens = self
            .config
            .capacity
            .min(bucket.tokens + elapsed.as_secs_f64() * self.config.refill_per_sec);
        bucket.refilled_at = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            tracing::debug!(uid, "rate limit exceeded");
            false
        }
    }

    /// Number of users holding a bucket.
    pub fn tracked(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_burst_up_to_capacity_then_deny() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at(42, t0));
        }
        assert!(!limiter.allow_at(42, t0));
    }

    #[test]
    fn test_refill_restores_tokens_over_time() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at(42, t0));
        }
        // 2 tokens/s: after half a second exactly one token is back.
        let t1 = t0 + Duration::from_millis(500);
        assert!(limiter.allow_at(42, t1));
        assert!(!limiter.allow_at(42, t1));
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        assert!(limiter.allow_at(7, t0));
        // A long sleep refills to capacity, not beyond it.
        let t1 = t0 + Duration::from_secs(3600);
        for _ in 0..5 {
            assert!(limiter.allow_at(7, t1));
        }
        assert!(!limiter.allow_at(7, t1));
    }

    #[test]
    fn test_users_have_independent_buckets() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at(1, t0));
        }
        assert!(!limiter.allow_at(1, t0));
        assert!(limiter.allow_at(2, t0));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_idle_bucket_is_not_forgotten() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at(9, t0));
        }
        // Long idle: the bucket refills but is never dropped, so the user
        // does not reappear as a stranger with a pristine bucket.
        let t1 = t0 + Duration::from_secs(600);
        assert!(limiter.allow_at(9, t1));
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_fractional_tokens_do_not_admit() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at(3, t0));
        }
        // 400ms at 2/s is 0.8 tokens: not enough.
        assert!(!limiter.allow_at(3, t0 + Duration::from_millis(400)));
    }
}
