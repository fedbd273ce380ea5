//! # Query Surface Types
//!
//! Named read operations answered by an engine and the typed responses they
//! produce. Responses are assembled from the engine's current records at call
//! time and never alias them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::entities::{App, Bundle, Cluster, Wave};
use super::entity_id::{EntityId, EntityKind};
use crate::error::{ReleaseError, Result};
use crate::state_machine::ReleaseState;

/// Release fields plus the derived wave id list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub id: EntityId,
    pub state: ReleaseState,
    pub workflow_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub wave_ids: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Release header used by the flat listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseOverview {
    pub id: EntityId,
    pub state: ReleaseState,
    pub workflow_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleNode {
    #[serde(flatten)]
    pub bundle: Bundle,
    pub apps: Vec<App>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterNode {
    #[serde(flatten)]
    pub cluster: Cluster,
    pub bundle: Option<BundleNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveNode {
    #[serde(flatten)]
    pub wave: Wave,
    pub clusters: Vec<ClusterNode>,
}

/// Full nested tree: release -> waves -> clusters -> bundle -> apps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseHierarchy {
    #[serde(flatten)]
    pub release: ReleaseSummary,
    pub waves: Vec<WaveNode>,
}

impl ReleaseHierarchy {
    /// Every id in the tree, grouped per kind in traversal order
    pub fn flatten_ids(&self) -> FlatIds {
        let mut ids = FlatIds::default();
        for wave in &self.waves {
            ids.waves.push(wave.wave.id.clone());
            for cluster in &wave.clusters {
                ids.clusters.push(cluster.cluster.id.clone());
                if let Some(bundle) = &cluster.bundle {
                    ids.bundles.push(bundle.bundle.id.clone());
                    ids.apps.extend(bundle.apps.iter().map(|a| a.id.clone()));
                }
            }
        }
        ids
    }
}

/// Flat lists of every entity, per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityListing {
    pub release: ReleaseOverview,
    pub waves: Vec<Wave>,
    pub clusters: Vec<Cluster>,
    pub bundles: Vec<Bundle>,
    pub apps: Vec<App>,
}

impl EntityListing {
    pub fn flatten_ids(&self) -> FlatIds {
        FlatIds {
            waves: self.waves.iter().map(|w| w.id.clone()).collect(),
            clusters: self.clusters.iter().map(|c| c.id.clone()).collect(),
            bundles: self.bundles.iter().map(|b| b.id.clone()).collect(),
            apps: self.apps.iter().map(|a| a.id.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatIds {
    pub waves: Vec<EntityId>,
    pub clusters: Vec<EntityId>,
    pub bundles: Vec<EntityId>,
    pub apps: Vec<EntityId>,
}

/// A named read operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    ReleaseState,
    WaveState(EntityId),
    ClusterState(EntityId),
    BundleState(EntityId),
    AppState(EntityId),
    Hierarchy,
    ListAllEntities,
}

impl Query {
    /// Resolve an operation name and its arguments, validating id prefixes
    pub fn parse(operation: &str, args: &[String]) -> Result<Self> {
        let single_id = |kind: EntityKind| -> Result<EntityId> {
            match args {
                [id] => EntityId::parse_as(kind, id),
                _ => Err(ReleaseError::InvalidParameter(format!(
                    "{operation} takes exactly one {kind} id, got {} arguments",
                    args.len()
                ))),
            }
        };
        let no_args = || -> Result<()> {
            if args.is_empty() {
                Ok(())
            } else {
                Err(ReleaseError::InvalidParameter(format!(
                    "{operation} takes no arguments"
                )))
            }
        };

        match operation {
            "get_release_state" => no_args().map(|_| Self::ReleaseState),
            "get_wave_state" => single_id(EntityKind::Wave).map(Self::WaveState),
            "get_cluster_state" => single_id(EntityKind::Cluster).map(Self::ClusterState),
            "get_bundle_state" => single_id(EntityKind::Bundle).map(Self::BundleState),
            "get_app_state" => single_id(EntityKind::App).map(Self::AppState),
            "get_hierarchy" => no_args().map(|_| Self::Hierarchy),
            "list_all_entities" => no_args().map(|_| Self::ListAllEntities),
            other => Err(ReleaseError::InvalidParameter(format!(
                "unknown query operation '{other}'"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReleaseState => "get_release_state",
            Self::WaveState(_) => "get_wave_state",
            Self::ClusterState(_) => "get_cluster_state",
            Self::BundleState(_) => "get_bundle_state",
            Self::AppState(_) => "get_app_state",
            Self::Hierarchy => "get_hierarchy",
            Self::ListAllEntities => "list_all_entities",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaveState(id) | Self::ClusterState(id) | Self::BundleState(id) | Self::AppState(id) => {
                write!(f, "{}({id})", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Typed answer to a [`Query`]; per-entity lookups are `None` when the id is unknown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "query", content = "data", rename_all = "snake_case")]
pub enum QueryResponse {
    Release(ReleaseSummary),
    Wave(Option<Wave>),
    Cluster(Option<Cluster>),
    Bundle(Option<Bundle>),
    App(Option<App>),
    Hierarchy(Box<ReleaseHierarchy>),
    Entities(Box<EntityListing>),
}

impl QueryResponse {
    /// Whether a per-entity lookup found its record
    pub fn is_found(&self) -> bool {
        match self {
            Self::Wave(w) => w.is_some(),
            Self::Cluster(c) => c.is_some(),
            Self::Bundle(b) => b.is_some(),
            Self::App(a) => a.is_some(),
            _ => true,
        }
    }

    pub fn into_release(self) -> Option<ReleaseSummary> {
        match self {
            Self::Release(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_hierarchy(self) -> Option<ReleaseHierarchy> {
        match self {
            Self::Hierarchy(h) => Some(*h),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parse_validates_names_and_args() {
        assert_eq!(
            Query::parse("get_hierarchy", &[]).unwrap(),
            Query::Hierarchy
        );
        let q = Query::parse("get_wave_state", &["wave:wave-1".to_string()]).unwrap();
        assert_eq!(q.name(), "get_wave_state");
        assert!(Query::parse("get_wave_state", &["cluster:cluster-1-1".to_string()]).is_err());
        assert!(Query::parse("get_wave_state", &[]).is_err());
        assert!(Query::parse("get_hierarchy", &["wave:wave-1".to_string()]).is_err());
        assert!(Query::parse("drop_everything", &[]).is_err());
    }

    #[test]
    fn test_missing_entity_response_is_not_found() {
        assert!(!QueryResponse::Wave(None).is_found());
        assert!(QueryResponse::Entities(Box::new(EntityListing {
            release: ReleaseOverview {
                id: EntityId::parse("release:r1").unwrap(),
                state: ReleaseState::Pending,
                workflow_id: String::new(),
                created_at: None,
                updated_at: None,
            },
            waves: vec![],
            clusters: vec![],
            bundles: vec![],
            apps: vec![],
        }))
        .is_found());
    }
}
