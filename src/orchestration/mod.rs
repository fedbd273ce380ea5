//! # Orchestration
//!
//! Builds and executes release trees.
//!
//! ## Core Components
//!
//! - **HierarchyBuilder**: deterministic Release -> Wave -> Cluster -> Bundle -> App construction
//! - **OrchestrationEngine**: runs one tree (sequential waves, parallel clusters, sequential apps)
//!   and answers read-only queries while it runs
//! - **EngineRegistry**: in-process host of many runs, exposing an external lifecycle status
//! - **Clock**: time source injected into the engine so runs can be driven under paused time

pub mod clock;
pub mod engine;
pub mod hierarchy_builder;
pub mod registry;
pub mod types;

pub use clock::{Clock, TokioClock};
pub use engine::{EntityTransition, OrchestrationEngine};
pub use hierarchy_builder::{BuiltHierarchy, HierarchyBuilder};
pub use registry::{EngineRegistry, WorkflowStatus};
pub use types::{FailScenario, RunParameters};
