//! # Data Layer
//!
//! Entity identifiers, per-level records and the typed responses of the query surface.

pub mod entities;
pub mod entity_id;
pub mod queries;

pub use entities::{App, Bundle, Cluster, EntityRecord, Wave};
pub use entity_id::{EntityId, EntityKind};
pub use queries::{
    BundleNode, ClusterNode, EntityListing, FlatIds, Query, QueryResponse, ReleaseHierarchy,
    ReleaseOverview, ReleaseSummary, WaveNode,
};
