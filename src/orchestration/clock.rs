//! # Clock Abstraction
//!
//! The engine never calls `tokio::time::sleep` or `Utc::now` directly; it goes
//! through a [`Clock`] so alternative timers can be injected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync + Debug {
    /// Wall-clock time used for record timestamps
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the calling unit; this is the engine's only suspension point
    async fn sleep(&self, duration: Duration);
}

/// Default clock backed by the tokio timer
///
/// Under `#[tokio::test(start_paused = true)]` sleeps complete instantly in
/// virtual time while still advancing `tokio::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
