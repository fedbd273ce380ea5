//! Shared helpers for integration tests

#![allow(dead_code)]

use release_core::client::{LocalTransport, ResilientClient};
use release_core::config::ClientConfig;
use release_core::models::{EntityId, EntityKind};
use release_core::orchestration::{
    EngineRegistry, FailScenario, OrchestrationEngine, RunParameters, TokioClock,
};
use std::sync::Arc;
use std::time::Duration;

/// Setup pause used by the scenario tests
pub const SETUP_INTERVAL: Duration = Duration::from_millis(500);

pub fn release_id(token: &str) -> EntityId {
    EntityId::new(EntityKind::Release, token).unwrap()
}

pub fn id(raw: &str) -> EntityId {
    EntityId::parse(raw).unwrap()
}

pub fn params(waves: usize, clusters: usize, apps: usize, deploy_secs: f64) -> RunParameters {
    RunParameters {
        num_waves: waves,
        clusters_per_wave: clusters,
        apps_per_bundle: apps,
        app_deploy_time: Duration::from_secs_f64(deploy_secs),
        fail_scenario: FailScenario::None,
    }
}

pub fn engine(token: &str, params: RunParameters) -> Arc<OrchestrationEngine> {
    Arc::new(
        OrchestrationEngine::with_clock(release_id(token), params, SETUP_INTERVAL, Arc::new(TokioClock))
            .unwrap(),
    )
}

pub fn local_client(registry: Arc<EngineRegistry>, config: ClientConfig) -> Arc<ResilientClient> {
    Arc::new(ResilientClient::new(
        Arc::new(LocalTransport::new(registry)),
        config,
    ))
}
