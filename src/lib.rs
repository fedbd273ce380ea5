#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Release Orchestrator Core
//!
//! Multi-level deployment rollout engine with a resilient, rate-limited query layer.
//!
//! ## Overview
//!
//! A release is rolled out as a five-level tree: Release -> Wave -> Cluster -> Bundle -> App.
//! Waves deploy one after another, the clusters of a wave deploy side by side, and the
//! apps of a bundle deploy strictly in order. While a run is in flight its whole tree can
//! be queried, and it can be cancelled at the next unit boundary.
//!
//! ## Module Organization
//!
//! - [`models`] - Entity identifiers, records and query response types
//! - [`state_machine`] - Entity and release states with their legal transitions
//! - [`orchestration`] - Hierarchy construction, the engine, and the in-process registry
//! - [`client`] - Resilient access layer: retries, batching, status overlay
//! - [`cache`] - TTL result cache
//! - [`resilience`] - Token bucket admission control
//! - [`config`] - Layered YAML configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging bootstrap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use release_core::config::EngineConfig;
//! use release_core::models::EntityId;
//! use release_core::orchestration::{OrchestrationEngine, RunParameters};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let params = RunParameters::new(2, 2, 3, 1.0, "none")?;
//! let engine = OrchestrationEngine::new(
//!     EntityId::parse("release:rel-2024-06")?,
//!     params,
//!     &EngineConfig::default(),
//! )?;
//!
//! engine.run().await?;
//! let listing = engine.list_all_entities();
//! println!("{} apps deployed", listing.apps.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod state_machine;

pub use cache::{CacheStats, ResultCache};
pub use client::{BatchQueryCoordinator, ClientError, EntityService, ResilientClient};
pub use config::{ConfigManager, ReleaseConfig};
pub use error::{ReleaseError, Result};
pub use models::{EntityId, EntityKind};
pub use orchestration::{EngineRegistry, OrchestrationEngine, RunParameters, WorkflowStatus};
pub use resilience::{AdmissionController, RateLimiter};
pub use state_machine::{EntityState, ReleaseState};
