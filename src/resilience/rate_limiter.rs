//! # Token Bucket Rate Limiter
//!
//! One bucket per client identity. A bucket holds at most `burst_size` tokens and
//! refills continuously at `requests_per_minute / 60` tokens per second. Each
//! admitted request consumes one token.

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::BucketConfig;

/// Outcome of one admission check, with the metadata callers expose as headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix time at which the bucket will be full again
    pub reset_at_epoch_secs: i64,
    /// Set only on denial; always at least one second
    pub retry_after_secs: Option<u64>,
}

impl RateLimitDecision {
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: BucketConfig,
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: BucketConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn config(&self) -> BucketConfig {
        self.config
    }

    fn refill_rate_per_sec(&self) -> f64 {
        f64::from(self.config.requests_per_minute) / 60.0
    }

    fn capacity(&self) -> f64 {
        f64::from(self.config.burst_size)
    }

    /// Refill the identity's bucket, then try to take one token
    pub fn is_allowed(&self, identity: &str) -> RateLimitDecision {
        let now = Instant::now();
        let rate = self.refill_rate_per_sec();
        let capacity = self.capacity();

        let mut bucket = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| TokenBucket {
                tokens: capacity,
                last_refill: now,
            });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(capacity);
        bucket.last_refill = now;

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        }
        let tokens = bucket.tokens;
        drop(bucket);

        let seconds_until = |deficit: f64| -> u64 {
            if deficit <= 0.0 {
                0
            } else if rate <= 0.0 {
                60
            } else {
                (deficit / rate).ceil() as u64
            }
        };

        let reset_at_epoch_secs = Utc::now().timestamp() + seconds_until(capacity - tokens) as i64;
        let retry_after_secs = (!allowed).then(|| seconds_until(1.0 - tokens).max(1));

        if allowed {
            debug!(identity, remaining = tokens.floor() as u32, "Request admitted");
        } else {
            warn!(identity, retry_after_secs, "🚦 Rate limit exceeded");
        }

        RateLimitDecision {
            allowed,
            limit: self.config.burst_size,
            remaining: tokens.floor().max(0.0) as u32,
            reset_at_epoch_secs,
            retry_after_secs,
        }
    }

    /// Drop buckets not touched for longer than `max_age`, returning how many went
    pub fn cleanup_old_entries(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) <= max_age);
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(removed, remaining = self.buckets.len(), "🧹 Purged idle rate limit buckets");
        }
        removed
    }

    pub fn tracked_identities(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rpm: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(BucketConfig {
            requests_per_minute: rpm,
            burst_size: burst,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_deny_then_refill() {
        let limiter = limiter(60, 10);
        for i in 0..10 {
            let decision = limiter.is_allowed("10.0.0.1");
            assert!(decision.allowed, "request {i} should be admitted");
            assert_eq!(decision.remaining, 9 - i);
        }

        let denied = limiter.is_allowed("10.0.0.1");
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, Some(1));
        assert_eq!(denied.limit, 10);

        // other identities have their own bucket
        assert!(limiter.is_allowed("10.0.0.2").allowed);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.is_allowed("10.0.0.1").allowed);
        assert!(!limiter.is_allowed("10.0.0.1").allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_burst() {
        let limiter = limiter(60, 3);
        limiter.is_allowed("client");
        tokio::time::advance(Duration::from_secs(3_600)).await;

        let decision = limiter.is_allowed("client");
        assert_eq!(decision.remaining, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_idle_buckets() {
        let limiter = limiter(60, 10);
        limiter.is_allowed("old");
        tokio::time::advance(Duration::from_secs(120)).await;
        limiter.is_allowed("fresh");

        assert_eq!(limiter.cleanup_old_entries(Duration::from_secs(60)), 1);
        assert_eq!(limiter.tracked_identities(), 1);
    }
}
