//! # Entity Service
//!
//! Read-side facade used by outer surfaces. Combines engine queries with the
//! external lifecycle status, caches the release listing, and resolves child
//! entities without knowing which release owns them.
//!
//! When built with an [`AdmissionController`], reads made through
//! [`EntityService::for_caller`] are rate limited per caller identity before they
//! reach the cache or the service.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{ClientError, ClientResult};
use super::resilient_client::ResilientClient;
use crate::cache::ResultCache;
use crate::constants::cache::RELEASE_LIST_KEY;
use crate::models::{
    App, Bundle, Cluster, EntityId, EntityKind, Query, QueryResponse, ReleaseHierarchy,
    ReleaseSummary, Wave,
};
use crate::resilience::AdmissionController;

/// A child record together with the release it was found in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Located<T> {
    pub release_id: EntityId,
    pub record: T,
}

#[derive(Debug)]
pub struct EntityService {
    client: Arc<ResilientClient>,
    cache: Arc<ResultCache>,
    admission: Option<Arc<AdmissionController>>,
}

impl EntityService {
    pub fn new(client: Arc<ResilientClient>, cache: Arc<ResultCache>) -> Self {
        Self {
            client,
            cache,
            admission: None,
        }
    }

    pub fn with_admission(mut self, admission: Arc<AdmissionController>) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Reads on behalf of `identity`, each one admitted against the rate limiter
    pub fn for_caller<'a>(&'a self, identity: &'a str) -> CallerScope<'a> {
        CallerScope {
            service: self,
            identity,
        }
    }

    pub fn client(&self) -> &Arc<ResilientClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Release summary with the external lifecycle status overlaid
    pub async fn get_release(&self, release_id: &EntityId) -> ClientResult<ReleaseSummary> {
        require_kind(release_id, EntityKind::Release)?;
        let mut summary = self
            .client
            .query(release_id, &Query::ReleaseState)
            .await?
            .into_release()
            .ok_or_else(|| ClientError::Unknown("unexpected response to get_release_state".to_string()))?;
        summary.state = self.overlay(release_id, summary.state).await;
        Ok(summary)
    }

    /// Full tree with the external lifecycle status overlaid on the release
    pub async fn get_release_hierarchy(&self, release_id: &EntityId) -> ClientResult<ReleaseHierarchy> {
        require_kind(release_id, EntityKind::Release)?;
        let mut hierarchy = self
            .client
            .query(release_id, &Query::Hierarchy)
            .await?
            .into_hierarchy()
            .ok_or_else(|| ClientError::Unknown("unexpected response to get_hierarchy".to_string()))?;
        hierarchy.release.state = self.overlay(release_id, hierarchy.release.state).await;
        Ok(hierarchy)
    }

    /// Every hosted release id, served from the cache while fresh
    pub async fn list_releases(&self) -> ClientResult<Vec<EntityId>> {
        if let Some(cached) = self.cache.get_as::<Vec<EntityId>>(RELEASE_LIST_KEY) {
            debug!(count = cached.len(), "🗂️ Release list served from cache");
            return Ok(cached);
        }

        let releases: Vec<EntityId> = self
            .client
            .list_workflows(None)
            .await?
            .into_iter()
            .filter(|id| id.kind() == EntityKind::Release)
            .collect();

        if let Err(e) = self.cache.set_as(RELEASE_LIST_KEY, &releases, None) {
            warn!(error = %e, "Failed to cache release list");
        }
        Ok(releases)
    }

    /// Drop the cached listing so the next call hits the service
    pub fn invalidate_release_list(&self) {
        self.cache.delete(RELEASE_LIST_KEY);
    }

    pub async fn find_wave(&self, wave_id: &EntityId) -> ClientResult<Option<Located<Wave>>> {
        require_kind(wave_id, EntityKind::Wave)?;
        self.find_in_releases(Query::WaveState(wave_id.clone()), |r| match r {
            QueryResponse::Wave(w) => w,
            _ => None,
        })
        .await
    }

    pub async fn find_cluster(&self, cluster_id: &EntityId) -> ClientResult<Option<Located<Cluster>>> {
        require_kind(cluster_id, EntityKind::Cluster)?;
        self.find_in_releases(Query::ClusterState(cluster_id.clone()), |r| match r {
            QueryResponse::Cluster(c) => c,
            _ => None,
        })
        .await
    }

    pub async fn find_bundle(&self, bundle_id: &EntityId) -> ClientResult<Option<Located<Bundle>>> {
        require_kind(bundle_id, EntityKind::Bundle)?;
        self.find_in_releases(Query::BundleState(bundle_id.clone()), |r| match r {
            QueryResponse::Bundle(b) => b,
            _ => None,
        })
        .await
    }

    pub async fn find_app(&self, app_id: &EntityId) -> ClientResult<Option<Located<App>>> {
        require_kind(app_id, EntityKind::App)?;
        self.find_in_releases(Query::AppState(app_id.clone()), |r| match r {
            QueryResponse::App(a) => a,
            _ => None,
        })
        .await
    }

    /// Ask each release in turn; releases that vanished in the meantime are skipped
    async fn find_in_releases<T, F>(&self, query: Query, extract: F) -> ClientResult<Option<Located<T>>>
    where
        F: Fn(QueryResponse) -> Option<T>,
    {
        for release_id in self.list_releases().await? {
            match self.client.query(&release_id, &query).await {
                Ok(response) => {
                    if let Some(record) = extract(response) {
                        return Ok(Some(Located { release_id, record }));
                    }
                }
                Err(e) if e.is_not_found() => {
                    debug!(release_id = %release_id, "Release disappeared during lookup");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn overlay(
        &self,
        release_id: &EntityId,
        internal: crate::state_machine::ReleaseState,
    ) -> crate::state_machine::ReleaseState {
        match self.client.get_workflow_status(release_id).await {
            Ok(status) => status.apply_to(internal),
            Err(e) => {
                warn!(release_id = %release_id, error = %e, "Could not read workflow status, using internal state");
                internal
            }
        }
    }
}

/// [`EntityService`] reads attributed to one caller identity
#[derive(Debug, Clone, Copy)]
pub struct CallerScope<'a> {
    service: &'a EntityService,
    identity: &'a str,
}

impl CallerScope<'_> {
    fn admit(&self) -> ClientResult<()> {
        match &self.service.admission {
            Some(admission) => admission.admit(self.identity, false).map(|_| ()),
            None => Ok(()),
        }
    }

    pub async fn get_release(&self, release_id: &EntityId) -> ClientResult<ReleaseSummary> {
        self.admit()?;
        self.service.get_release(release_id).await
    }

    pub async fn get_release_hierarchy(&self, release_id: &EntityId) -> ClientResult<ReleaseHierarchy> {
        self.admit()?;
        self.service.get_release_hierarchy(release_id).await
    }

    pub async fn list_releases(&self) -> ClientResult<Vec<EntityId>> {
        self.admit()?;
        self.service.list_releases().await
    }

    pub async fn find_wave(&self, wave_id: &EntityId) -> ClientResult<Option<Located<Wave>>> {
        self.admit()?;
        self.service.find_wave(wave_id).await
    }

    pub async fn find_cluster(&self, cluster_id: &EntityId) -> ClientResult<Option<Located<Cluster>>> {
        self.admit()?;
        self.service.find_cluster(cluster_id).await
    }

    pub async fn find_bundle(&self, bundle_id: &EntityId) -> ClientResult<Option<Located<Bundle>>> {
        self.admit()?;
        self.service.find_bundle(bundle_id).await
    }

    pub async fn find_app(&self, app_id: &EntityId) -> ClientResult<Option<Located<App>>> {
        self.admit()?;
        self.service.find_app(app_id).await
    }
}

fn require_kind(id: &EntityId, kind: EntityKind) -> ClientResult<()> {
    if id.kind() == kind {
        Ok(())
    } else {
        Err(ClientError::InvalidRequest(format!(
            "expected a {kind} id, got '{id}'"
        )))
    }
}
