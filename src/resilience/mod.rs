//! # Resilience Module
//!
//! Admission control in front of the access layer.
//!
//! ## Architecture
//!
//! - **RateLimiter**: token bucket per client identity, refilled continuously
//! - **AdmissionController**: default and sensitive bucket sets with periodic purging
//!
//! ## Usage
//!
//! ```rust
//! use release_core::config::RateLimitingConfig;
//! use release_core::resilience::AdmissionController;
//!
//! # tokio_test::block_on(async {
//! let controller = AdmissionController::new(&RateLimitingConfig::default());
//! let decision = controller.check("203.0.113.7", false);
//! assert!(decision.allowed);
//! assert_eq!(decision.remaining, 9);
//! # });
//! ```

pub mod admission;
pub mod rate_limiter;

pub use admission::AdmissionController;
pub use rate_limiter::{RateLimitDecision, RateLimiter};
