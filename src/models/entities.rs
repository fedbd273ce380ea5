//! # Entity Records
//!
//! One struct per hierarchy level. Records are owned and mutated only by the
//! orchestration engine; everything handed to callers is a clone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;
use crate::state_machine::EntityState;

/// Shared accessors for the four child-entity record types
pub trait EntityRecord {
    fn id(&self) -> &EntityId;
    fn state(&self) -> EntityState;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Apply a new state; `updated_at` never moves behind `created_at`
    fn set_state(&mut self, state: EntityState, now: DateTime<Utc>);
}

macro_rules! impl_entity_record {
    ($ty:ty) => {
        impl EntityRecord for $ty {
            fn id(&self) -> &EntityId {
                &self.id
            }

            fn state(&self) -> EntityState {
                self.state
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }

            fn set_state(&mut self, state: EntityState, now: DateTime<Utc>) {
                self.state = state;
                self.updated_at = now.max(self.created_at);
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    pub id: EntityId,
    pub release_id: EntityId,
    /// 1-based position in the rollout
    pub sequence: usize,
    pub state: EntityState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cluster_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: EntityId,
    pub wave_id: EntityId,
    pub name: Option<String>,
    pub state: EntityState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Every cluster owns exactly one bundle
    pub bundle_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: EntityId,
    pub cluster_id: EntityId,
    pub name: Option<String>,
    pub state: EntityState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Deployment order; apps run strictly in this order
    pub app_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: EntityId,
    pub bundle_id: EntityId,
    pub name: Option<String>,
    pub version: String,
    pub state: EntityState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity_record!(Wave);
impl_entity_record!(Cluster);
impl_entity_record!(Bundle);
impl_entity_record!(App);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_set_state_never_precedes_creation() {
        let created = Utc::now();
        let mut app = App {
            id: EntityId::parse("app:b-app-1").unwrap(),
            bundle_id: EntityId::parse("bundle:b").unwrap(),
            name: None,
            version: "v1.1.0".to_string(),
            state: EntityState::Pending,
            created_at: created,
            updated_at: created,
        };

        app.set_state(EntityState::Deploying, created - Duration::seconds(5));
        assert_eq!(app.state(), EntityState::Deploying);
        assert_eq!(app.updated_at(), created);

        let later = created + Duration::seconds(3);
        app.set_state(EntityState::Completed, later);
        assert_eq!(app.updated_at(), later);
    }
}
