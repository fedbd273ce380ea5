//! # Admission Control
//!
//! Chooses between the default and the sensitive bucket set for each request and
//! periodically purges idle identities from both.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

use super::rate_limiter::{RateLimitDecision, RateLimiter};
use crate::client::ClientError;
use crate::config::RateLimitingConfig;

#[derive(Debug)]
pub struct AdmissionController {
    enabled: bool,
    default_limiter: RateLimiter,
    sensitive_limiter: RateLimiter,
    request_count: AtomicU64,
    cleanup_every_requests: u64,
    max_entry_age: Duration,
}

impl AdmissionController {
    pub fn new(config: &RateLimitingConfig) -> Self {
        Self {
            enabled: config.enabled,
            default_limiter: RateLimiter::new(config.default),
            sensitive_limiter: RateLimiter::new(config.sensitive),
            request_count: AtomicU64::new(0),
            cleanup_every_requests: config.cleanup_every_requests.max(1),
            max_entry_age: config.max_entry_age(),
        }
    }

    /// Check one request; `sensitive` selects the stricter bucket set
    pub fn check(&self, identity: &str, sensitive: bool) -> RateLimitDecision {
        let limiter = if sensitive {
            &self.sensitive_limiter
        } else {
            &self.default_limiter
        };

        if !self.enabled {
            let limit = limiter.config().burst_size;
            return RateLimitDecision {
                allowed: true,
                limit,
                remaining: limit,
                reset_at_epoch_secs: chrono::Utc::now().timestamp(),
                retry_after_secs: None,
            };
        }

        let count = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.cleanup_every_requests == 0 {
            let removed = self.default_limiter.cleanup_old_entries(self.max_entry_age)
                + self.sensitive_limiter.cleanup_old_entries(self.max_entry_age);
            info!(removed, requests_seen = count, "🧹 Rate limiter cleanup");
        }

        limiter.is_allowed(identity)
    }

    /// Like [`check`](Self::check), but a denial becomes [`ClientError::RateLimited`]
    pub fn admit(&self, identity: &str, sensitive: bool) -> Result<RateLimitDecision, ClientError> {
        let decision = self.check(identity, sensitive);
        if decision.allowed {
            Ok(decision)
        } else {
            Err(ClientError::RateLimited {
                retry_after: decision.retry_after().unwrap_or(Duration::from_secs(1)),
            })
        }
    }

    pub fn tracked_identities(&self) -> usize {
        self.default_limiter.tracked_identities() + self.sensitive_limiter.tracked_identities()
    }
}
