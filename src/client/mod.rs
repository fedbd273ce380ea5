//! # Access Layer
//!
//! Everything outside the engine reads release state through this module.
//!
//! ## Components
//!
//! - **RemoteTransport**: the boundary to wherever runs are hosted ([`LocalTransport`] for an
//!   in-process [`EngineRegistry`](crate::orchestration::EngineRegistry))
//! - **ResilientClient**: timeouts, retries with backoff, reconnects, typed errors
//! - **BatchQueryCoordinator**: semaphore-bounded fan-out over many releases
//! - **EntityService**: status overlay, cached release listing, cross-release lookups
//!
//! ## Usage
//!
//! ```rust,no_run
//! use release_core::client::{LocalTransport, ResilientClient};
//! use release_core::config::ClientConfig;
//! use release_core::models::{EntityId, Query};
//! use release_core::orchestration::EngineRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(EngineRegistry::default());
//! let client = ResilientClient::new(
//!     Arc::new(LocalTransport::new(registry)),
//!     ClientConfig::default(),
//! );
//!
//! let release_id = EntityId::parse("release:rel-2024-06")?;
//! let hierarchy = client.query(&release_id, &Query::Hierarchy).await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod entity_service;
pub mod error;
pub mod resilient_client;
pub mod transport;

pub use batch::{BatchOutcome, BatchQueryCoordinator};
pub use entity_service::{CallerScope, EntityService, Located};
pub use error::{ClientError, ClientResult, TransportError};
pub use resilient_client::ResilientClient;
pub use transport::{LocalTransport, RemoteTransport};
