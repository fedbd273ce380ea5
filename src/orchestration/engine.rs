//! # Orchestration Engine
//!
//! Executes one release tree under a fixed concurrency discipline:
//!
//! - waves run strictly one at a time, in sequence order
//! - the clusters of a wave fan out together and join at a barrier
//! - each cluster deploys its single bundle
//! - the apps of a bundle deploy strictly one at a time, in list order
//!
//! The engine is single-owner: only the run mutates records, and every read goes
//! through the query surface, which clones out of a single read lock so callers
//! always see a point-in-time snapshot of the whole tree.
//!
//! ## Cancellation
//!
//! Cancellation is a sticky flag polled at each unit's start boundary. A unit that
//! has already passed its boundary (for example an app mid-deploy) runs to
//! completion; only units that start afterwards observe the flag. A cancelled
//! unit sweeps its not-yet-started descendants to `cancelled`, and a parent whose
//! child ended cancelled ends cancelled itself.
//!
//! ## Failure propagation
//!
//! A failing app raises a non-retryable [`ReleaseError::DeploymentFailed`]. Its
//! bundle and cluster end `failed` and re-raise. The wave barrier always waits for
//! every sibling cluster to finish, then re-raises the first failure in cluster
//! order. The release records the message and ends `failed`.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::clock::{Clock, TokioClock};
use super::hierarchy_builder::{BuiltHierarchy, HierarchyBuilder};
use super::types::{FailScenario, RunParameters};
use crate::config::EngineConfig;
use crate::constants::engine::CANCELLED_MESSAGE;
use crate::error::{ReleaseError, Result};
use crate::logging::{log_entity_transition, log_error};
use crate::models::{
    App, Bundle, BundleNode, Cluster, ClusterNode, EntityId, EntityKind, EntityListing,
    EntityRecord, Query, QueryResponse, ReleaseHierarchy, ReleaseOverview, ReleaseSummary, Wave,
    WaveNode,
};
use crate::state_machine::{EntityState, ReleaseState};

/// How a unit that did not fail came to rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Completed,
    Cancelled,
}

/// One recorded state change, in the order the engine applied it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTransition {
    pub sequence: u64,
    pub entity_id: EntityId,
    pub from: String,
    pub to: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ReleaseHeader {
    state: ReleaseState,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

/// Arena of every record in the tree, indexed by id per kind
#[derive(Debug, Default)]
struct EntityStore {
    release: ReleaseHeader,
    waves: Vec<Wave>,
    clusters: Vec<Cluster>,
    bundles: Vec<Bundle>,
    apps: Vec<App>,
    index: HashMap<EntityId, usize>,
    transitions: Vec<EntityTransition>,
}

impl EntityStore {
    fn install(&mut self, built: BuiltHierarchy) {
        self.index.clear();
        for (pos, w) in built.waves.iter().enumerate() {
            self.index.insert(w.id.clone(), pos);
        }
        for (pos, c) in built.clusters.iter().enumerate() {
            self.index.insert(c.id.clone(), pos);
        }
        for (pos, b) in built.bundles.iter().enumerate() {
            self.index.insert(b.id.clone(), pos);
        }
        for (pos, a) in built.apps.iter().enumerate() {
            self.index.insert(a.id.clone(), pos);
        }
        self.waves = built.waves;
        self.clusters = built.clusters;
        self.bundles = built.bundles;
        self.apps = built.apps;
    }

    fn wave(&self, id: &EntityId) -> Option<&Wave> {
        (id.kind() == EntityKind::Wave)
            .then(|| self.index.get(id).and_then(|&pos| self.waves.get(pos)))
            .flatten()
    }

    fn cluster(&self, id: &EntityId) -> Option<&Cluster> {
        (id.kind() == EntityKind::Cluster)
            .then(|| self.index.get(id).and_then(|&pos| self.clusters.get(pos)))
            .flatten()
    }

    fn bundle(&self, id: &EntityId) -> Option<&Bundle> {
        (id.kind() == EntityKind::Bundle)
            .then(|| self.index.get(id).and_then(|&pos| self.bundles.get(pos)))
            .flatten()
    }

    fn app(&self, id: &EntityId) -> Option<&App> {
        (id.kind() == EntityKind::App)
            .then(|| self.index.get(id).and_then(|&pos| self.apps.get(pos)))
            .flatten()
    }

    fn record_mut(&mut self, id: &EntityId) -> Option<&mut dyn EntityRecord> {
        let pos = *self.index.get(id)?;
        match id.kind() {
            EntityKind::Wave => self.waves.get_mut(pos).map(|r| r as &mut dyn EntityRecord),
            EntityKind::Cluster => self.clusters.get_mut(pos).map(|r| r as &mut dyn EntityRecord),
            EntityKind::Bundle => self.bundles.get_mut(pos).map(|r| r as &mut dyn EntityRecord),
            EntityKind::App => self.apps.get_mut(pos).map(|r| r as &mut dyn EntityRecord),
            EntityKind::Release => None,
        }
    }

    fn push_transition(&mut self, entity_id: &EntityId, from: String, to: String, at: DateTime<Utc>) {
        let sequence = self.transitions.len() as u64 + 1;
        self.transitions.push(EntityTransition {
            sequence,
            entity_id: entity_id.clone(),
            from,
            to,
            at,
        });
    }
}

/// State machine that executes one release tree and answers queries about it
#[derive(Debug)]
pub struct OrchestrationEngine {
    release_id: EntityId,
    workflow_id: String,
    params: RunParameters,
    setup_interval: Duration,
    clock: Arc<dyn Clock>,
    cancel_requested: AtomicBool,
    started: AtomicBool,
    store: RwLock<EntityStore>,
}

impl OrchestrationEngine {
    /// Create an engine using the tokio clock and the configured setup interval
    pub fn new(release_id: EntityId, params: RunParameters, config: &EngineConfig) -> Result<Self> {
        Self::with_clock(release_id, params, config.setup_interval(), Arc::new(TokioClock))
    }

    /// Create an engine with an injected clock
    pub fn with_clock(
        release_id: EntityId,
        params: RunParameters,
        setup_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if release_id.kind() != EntityKind::Release {
            return Err(ReleaseError::InvalidEntityId(format!(
                "engine root must be a release id, got '{release_id}'"
            )));
        }

        let workflow_id = format!("release-wf-{}", uuid::Uuid::new_v4());
        Ok(Self {
            release_id,
            workflow_id,
            params,
            setup_interval,
            clock,
            cancel_requested: AtomicBool::new(false),
            started: AtomicBool::new(false),
            store: RwLock::new(EntityStore::default()),
        })
    }

    pub fn release_id(&self) -> &EntityId {
        &self.release_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn parameters(&self) -> &RunParameters {
        &self.params
    }

    /// Fire-and-forget cancellation signal; observed at the next unit boundary
    pub fn cancel_release(&self) {
        if !self.cancel_requested.swap(true, Ordering::SeqCst) {
            info!(release_id = %self.release_id, "🛑 Cancellation requested");
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Execute the whole release. May only be called once per engine.
    ///
    /// Returns the release id when the run ends `completed` or `cancelled`, and the
    /// raised error when it ends `failed`.
    #[instrument(skip(self), fields(release_id = %self.release_id, workflow_id = %self.workflow_id))]
    pub async fn run(&self) -> Result<EntityId> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ReleaseError::StateTransitionError(format!(
                "release {} has already been started",
                self.release_id
            )));
        }

        info!(
            num_waves = self.params.num_waves,
            clusters_per_wave = self.params.clusters_per_wave,
            apps_per_bundle = self.params.apps_per_bundle,
            app_deploy_time_ms = self.params.app_deploy_time.as_millis() as u64,
            fail_scenario = %self.params.fail_scenario,
            "🚀 Starting release"
        );

        let result = match self.build_hierarchy() {
            Ok(()) => self.execute_waves().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(UnitOutcome::Completed) => {
                self.finish_release(ReleaseState::Completed, None);
                info!("✅ Release completed");
                Ok(self.release_id.clone())
            }
            Ok(UnitOutcome::Cancelled) => {
                self.finish_release(ReleaseState::Cancelled, Some(CANCELLED_MESSAGE.to_string()));
                warn!("🛑 Release cancelled");
                Ok(self.release_id.clone())
            }
            Err(e) if e.is_domain_failure() => {
                self.finish_release(ReleaseState::Failed, Some(e.to_string()));
                error!(error = %e, "❌ Release failed");
                Err(e)
            }
            Err(e) => {
                self.finish_release(ReleaseState::Failed, Some(format!("Unexpected error: {e}")));
                log_error("orchestration_engine", "run", &e.to_string(), Some(self.release_id.as_str()));
                Err(e)
            }
        }
    }

    fn build_hierarchy(&self) -> Result<()> {
        let now = self.clock.now();
        let built = HierarchyBuilder::new(
            self.params.num_waves,
            self.params.clusters_per_wave,
            self.params.apps_per_bundle,
        )
        .build(&self.release_id, now)?;

        let mut store = self.store.write();
        store.install(built);
        store.release.created_at = Some(now);
        store.release.updated_at = Some(now);
        store.release.state = ReleaseState::InProgress;
        store.push_transition(
            &self.release_id,
            ReleaseState::Pending.to_string(),
            ReleaseState::InProgress.to_string(),
            now,
        );
        debug!(
            waves = store.waves.len(),
            clusters = store.clusters.len(),
            bundles = store.bundles.len(),
            apps = store.apps.len(),
            "🌳 Hierarchy built"
        );
        Ok(())
    }

    fn finish_release(&self, state: ReleaseState, error_message: Option<String>) {
        let now = self.clock.now();
        let mut store = self.store.write();
        let from = store.release.state;
        if !from.can_transition_to(state) {
            warn!(from = %from, to = %state, "Ignoring illegal release transition");
            return;
        }
        store.release.state = state;
        store.release.updated_at = Some(store.release.created_at.map_or(now, |c| now.max(c)));
        if error_message.is_some() {
            store.release.error_message = error_message;
        }
        store.push_transition(&self.release_id, from.to_string(), state.to_string(), now);
    }

    async fn execute_waves(&self) -> Result<UnitOutcome> {
        let wave_ids: Vec<EntityId> = self.store.read().waves.iter().map(|w| w.id.clone()).collect();

        for (pos, wave_id) in wave_ids.iter().enumerate() {
            if self.process_wave(wave_id).await? == UnitOutcome::Cancelled {
                for remaining in &wave_ids[pos + 1..] {
                    self.sweep_cancelled(remaining)?;
                }
                return Ok(UnitOutcome::Cancelled);
            }
        }
        Ok(UnitOutcome::Completed)
    }

    async fn process_wave(&self, wave_id: &EntityId) -> Result<UnitOutcome> {
        if self.is_cancel_requested() {
            self.sweep_cancelled(wave_id)?;
            return Ok(UnitOutcome::Cancelled);
        }

        self.transition(wave_id, EntityState::Deploying)?;
        self.clock.sleep(self.setup_interval).await;

        let cluster_ids = self
            .store
            .read()
            .wave(wave_id)
            .map(|w| w.cluster_ids.clone())
            .unwrap_or_default();

        // Fan out every cluster, then join: siblings always run to completion
        let results = join_all(cluster_ids.iter().map(|id| self.process_cluster(id))).await;

        let mut outcome = UnitOutcome::Completed;
        let mut first_failure = None;
        for result in results {
            match result {
                Ok(UnitOutcome::Cancelled) => outcome = UnitOutcome::Cancelled,
                Ok(UnitOutcome::Completed) => {}
                Err(e) => {
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_failure {
            self.transition(wave_id, EntityState::Failed)?;
            return Err(e);
        }
        self.settle(wave_id, outcome)?;
        Ok(outcome)
    }

    async fn process_cluster(&self, cluster_id: &EntityId) -> Result<UnitOutcome> {
        if self.is_cancel_requested() {
            self.sweep_cancelled(cluster_id)?;
            return Ok(UnitOutcome::Cancelled);
        }

        self.transition(cluster_id, EntityState::Deploying)?;
        self.clock.sleep(self.setup_interval).await;

        let bundle_id = self
            .store
            .read()
            .cluster(cluster_id)
            .map(|c| c.bundle_id.clone())
            .ok_or_else(|| {
                ReleaseError::InternalError(format!("cluster {cluster_id} vanished from the store"))
            })?;

        match self.process_bundle(&bundle_id).await {
            Ok(outcome) => {
                self.settle(cluster_id, outcome)?;
                Ok(outcome)
            }
            Err(e) => {
                self.transition(cluster_id, EntityState::Failed)?;
                Err(e)
            }
        }
    }

    async fn process_bundle(&self, bundle_id: &EntityId) -> Result<UnitOutcome> {
        if self.is_cancel_requested() {
            self.sweep_cancelled(bundle_id)?;
            return Ok(UnitOutcome::Cancelled);
        }

        self.transition(bundle_id, EntityState::Deploying)?;
        self.clock.sleep(self.setup_interval).await;

        let app_ids = self
            .store
            .read()
            .bundle(bundle_id)
            .map(|b| b.app_ids.clone())
            .unwrap_or_default();

        // Apps may depend on their predecessors: strictly one at a time
        let mut outcome = UnitOutcome::Completed;
        for app_id in &app_ids {
            match self.process_app(app_id).await {
                Ok(UnitOutcome::Cancelled) => outcome = UnitOutcome::Cancelled,
                Ok(UnitOutcome::Completed) => {}
                Err(e) => {
                    self.transition(bundle_id, EntityState::Failed)?;
                    return Err(e);
                }
            }
        }

        self.settle(bundle_id, outcome)?;
        Ok(outcome)
    }

    async fn process_app(&self, app_id: &EntityId) -> Result<UnitOutcome> {
        if self.is_cancel_requested() {
            self.transition(app_id, EntityState::Cancelled)?;
            return Ok(UnitOutcome::Cancelled);
        }

        self.transition(app_id, EntityState::Deploying)?;
        // The deploy pause is never interrupted, even by cancellation
        self.clock.sleep(self.params.app_deploy_time).await;

        if self.params.fail_scenario.should_fail(app_id) {
            self.transition(app_id, EntityState::Failed)?;
            return Err(ReleaseError::deployment_failed(
                app_id.as_str(),
                format!("App deployment failed: {app_id} - Simulated failure scenario"),
            ));
        }

        self.transition(app_id, EntityState::Completed)?;
        Ok(UnitOutcome::Completed)
    }

    fn settle(&self, id: &EntityId, outcome: UnitOutcome) -> Result<()> {
        match outcome {
            UnitOutcome::Completed => self.transition(id, EntityState::Completed),
            UnitOutcome::Cancelled => self.transition(id, EntityState::Cancelled),
        }
    }

    /// Apply one state change under the write lock; illegal edges are internal errors
    fn transition(&self, id: &EntityId, next: EntityState) -> Result<()> {
        let now = self.clock.now();
        let mut store = self.store.write();
        let record = store.record_mut(id).ok_or_else(|| {
            ReleaseError::InternalError(format!("unknown entity {id} in release {}", self.release_id))
        })?;

        let from = record.state();
        if !from.can_transition_to(next) {
            return Err(ReleaseError::StateTransitionError(format!(
                "{id}: {from} -> {next} is not allowed"
            )));
        }
        record.set_state(next, now);
        store.push_transition(id, from.to_string(), next.to_string(), now);
        drop(store);

        log_entity_transition(self.release_id.as_str(), id.as_str(), &from.to_string(), &next.to_string());
        Ok(())
    }

    /// Mark a unit and all of its still-pending descendants `cancelled`
    fn sweep_cancelled(&self, root: &EntityId) -> Result<()> {
        let mut pending = vec![root.clone()];
        while let Some(id) = pending.pop() {
            let (state, children) = {
                let store = self.store.read();
                match id.kind() {
                    EntityKind::Wave => store
                        .wave(&id)
                        .map(|w| (w.state, w.cluster_ids.clone())),
                    EntityKind::Cluster => store
                        .cluster(&id)
                        .map(|c| (c.state, vec![c.bundle_id.clone()])),
                    EntityKind::Bundle => store
                        .bundle(&id)
                        .map(|b| (b.state, b.app_ids.clone())),
                    EntityKind::App => store.app(&id).map(|a| (a.state, Vec::new())),
                    EntityKind::Release => None,
                }
                .ok_or_else(|| ReleaseError::InternalError(format!("unknown entity {id}")))?
            };

            if state == EntityState::Pending {
                self.transition(&id, EntityState::Cancelled)?;
            }
            pending.extend(children);
        }
        Ok(())
    }

    // =========================================================================
    // Query surface
    // =========================================================================

    /// Release fields, derived wave ids and the error message if any
    pub fn get_release_state(&self) -> ReleaseSummary {
        let store = self.store.read();
        self.summary_from(&store)
    }

    pub fn get_wave_state(&self, wave_id: &EntityId) -> Result<Option<Wave>> {
        Self::expect_kind(wave_id, EntityKind::Wave)?;
        Ok(self.store.read().wave(wave_id).cloned())
    }

    pub fn get_cluster_state(&self, cluster_id: &EntityId) -> Result<Option<Cluster>> {
        Self::expect_kind(cluster_id, EntityKind::Cluster)?;
        Ok(self.store.read().cluster(cluster_id).cloned())
    }

    pub fn get_bundle_state(&self, bundle_id: &EntityId) -> Result<Option<Bundle>> {
        Self::expect_kind(bundle_id, EntityKind::Bundle)?;
        Ok(self.store.read().bundle(bundle_id).cloned())
    }

    pub fn get_app_state(&self, app_id: &EntityId) -> Result<Option<App>> {
        Self::expect_kind(app_id, EntityKind::App)?;
        Ok(self.store.read().app(app_id).cloned())
    }

    /// Full nested tree, dereferenced against the current records in one snapshot
    pub fn get_hierarchy(&self) -> ReleaseHierarchy {
        let store = self.store.read();
        let waves = store
            .waves
            .iter()
            .map(|wave| WaveNode {
                wave: wave.clone(),
                clusters: wave
                    .cluster_ids
                    .iter()
                    .filter_map(|cid| store.cluster(cid))
                    .map(|cluster| ClusterNode {
                        cluster: cluster.clone(),
                        bundle: store.bundle(&cluster.bundle_id).map(|bundle| BundleNode {
                            bundle: bundle.clone(),
                            apps: bundle
                                .app_ids
                                .iter()
                                .filter_map(|aid| store.app(aid).cloned())
                                .collect(),
                        }),
                    })
                    .collect(),
            })
            .collect();

        ReleaseHierarchy {
            release: self.summary_from(&store),
            waves,
        }
    }

    /// Flat lists per kind plus the release header
    pub fn list_all_entities(&self) -> EntityListing {
        let store = self.store.read();
        EntityListing {
            release: ReleaseOverview {
                id: self.release_id.clone(),
                state: store.release.state,
                workflow_id: self.workflow_id.clone(),
                created_at: store.release.created_at,
                updated_at: store.release.updated_at,
            },
            waves: store.waves.clone(),
            clusters: store.clusters.clone(),
            bundles: store.bundles.clone(),
            apps: store.apps.clone(),
        }
    }

    /// Every state change applied so far, oldest first
    pub fn transitions(&self) -> Vec<EntityTransition> {
        self.store.read().transitions.clone()
    }

    /// Dispatch a named query
    pub fn answer(&self, query: &Query) -> Result<QueryResponse> {
        Ok(match query {
            Query::ReleaseState => QueryResponse::Release(self.get_release_state()),
            Query::WaveState(id) => QueryResponse::Wave(self.get_wave_state(id)?),
            Query::ClusterState(id) => QueryResponse::Cluster(self.get_cluster_state(id)?),
            Query::BundleState(id) => QueryResponse::Bundle(self.get_bundle_state(id)?),
            Query::AppState(id) => QueryResponse::App(self.get_app_state(id)?),
            Query::Hierarchy => QueryResponse::Hierarchy(Box::new(self.get_hierarchy())),
            Query::ListAllEntities => QueryResponse::Entities(Box::new(self.list_all_entities())),
        })
    }

    pub fn fail_scenario(&self) -> FailScenario {
        self.params.fail_scenario
    }

    fn summary_from(&self, store: &EntityStore) -> ReleaseSummary {
        ReleaseSummary {
            id: self.release_id.clone(),
            state: store.release.state,
            workflow_id: self.workflow_id.clone(),
            created_at: store.release.created_at,
            updated_at: store.release.updated_at,
            wave_ids: store.waves.iter().map(|w| w.id.clone()).collect(),
            error_message: store.release.error_message.clone(),
        }
    }

    fn expect_kind(id: &EntityId, kind: EntityKind) -> Result<()> {
        if id.kind() == kind {
            Ok(())
        } else {
            Err(ReleaseError::InvalidEntityId(format!(
                "expected a {kind} id, got '{id}'"
            )))
        }
    }
}
