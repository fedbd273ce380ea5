//! # Engine Registry
//!
//! In-process host for many release runs, keyed by release id. Each hosted release
//! owns one [`OrchestrationEngine`] and the tokio task driving its run. The access
//! layer talks to the registry only through a transport, the way it would talk to
//! a remote workflow service.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::engine::OrchestrationEngine;
use super::types::RunParameters;
use crate::config::EngineConfig;
use crate::error::{ReleaseError, Result};
use crate::models::EntityId;
use crate::state_machine::ReleaseState;

/// Lifecycle of a hosted run as seen from outside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    Terminated,
    TimedOut,
}

impl WorkflowStatus {
    /// Overlay this external status onto an internal release state.
    ///
    /// An externally forced terminal state wins over anything except an internal
    /// `failed`, which always keeps its own error context.
    pub fn apply_to(self, internal: ReleaseState) -> ReleaseState {
        if internal == ReleaseState::Failed {
            return internal;
        }
        match self {
            Self::Terminated => ReleaseState::Terminated,
            Self::Cancelled => ReleaseState::Cancelled,
            Self::Failed => ReleaseState::Failed,
            Self::TimedOut => ReleaseState::TimedOut,
            Self::Running | Self::Completed => internal,
        }
    }

    fn from_release_state(state: ReleaseState) -> Self {
        match state {
            ReleaseState::Pending | ReleaseState::InProgress => Self::Running,
            ReleaseState::Completed => Self::Completed,
            ReleaseState::Failed => Self::Failed,
            ReleaseState::Cancelled => Self::Cancelled,
            ReleaseState::Terminated => Self::Terminated,
            ReleaseState::TimedOut => Self::TimedOut,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Terminated => "terminated",
            Self::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct HostedRelease {
    engine: Arc<OrchestrationEngine>,
    handle: Option<JoinHandle<Result<EntityId>>>,
    terminated: bool,
}

/// Registry of hosted release runs
#[derive(Debug)]
pub struct EngineRegistry {
    engine_config: EngineConfig,
    releases: RwLock<HashMap<EntityId, HostedRelease>>,
}

impl EngineRegistry {
    pub fn new(engine_config: EngineConfig) -> Self {
        Self {
            engine_config,
            releases: RwLock::new(HashMap::new()),
        }
    }

    /// Create an engine for `release_id` and spawn its run on the current runtime
    pub fn start(&self, release_id: EntityId, params: RunParameters) -> Result<Arc<OrchestrationEngine>> {
        let engine = Arc::new(OrchestrationEngine::new(
            release_id.clone(),
            params,
            &self.engine_config,
        )?);
        self.host(engine)
    }

    /// Host an already constructed engine and spawn its run
    pub fn host(&self, engine: Arc<OrchestrationEngine>) -> Result<Arc<OrchestrationEngine>> {
        let release_id = engine.release_id().clone();
        let mut releases = self.releases.write();
        if releases.contains_key(&release_id) {
            return Err(ReleaseError::InvalidParameter(format!(
                "release {release_id} is already hosted"
            )));
        }

        let runner = engine.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        releases.insert(
            release_id.clone(),
            HostedRelease {
                engine: engine.clone(),
                handle: Some(handle),
                terminated: false,
            },
        );

        info!(release_id = %release_id, workflow_id = %engine.workflow_id(), "📦 Release hosted");
        Ok(engine)
    }

    pub fn get(&self, release_id: &EntityId) -> Option<Arc<OrchestrationEngine>> {
        self.releases.read().get(release_id).map(|h| h.engine.clone())
    }

    /// Deliver the cancellation signal; returns whether the release is hosted
    pub fn signal_cancel(&self, release_id: &EntityId) -> bool {
        match self.releases.read().get(release_id) {
            Some(hosted) => {
                hosted.engine.cancel_release();
                true
            }
            None => false,
        }
    }

    /// Abort the run outright; the engine's records stay as they were at the abort
    pub fn terminate(&self, release_id: &EntityId) -> bool {
        let mut releases = self.releases.write();
        let Some(hosted) = releases.get_mut(release_id) else {
            return false;
        };

        if let Some(handle) = hosted.handle.as_ref() {
            if !handle.is_finished() {
                handle.abort();
                hosted.terminated = true;
                warn!(release_id = %release_id, "⛔ Release run terminated");
            }
        }
        true
    }

    /// External lifecycle status of a hosted release
    pub fn describe(&self, release_id: &EntityId) -> Option<WorkflowStatus> {
        let releases = self.releases.read();
        let hosted = releases.get(release_id)?;
        if hosted.terminated {
            return Some(WorkflowStatus::Terminated);
        }
        Some(WorkflowStatus::from_release_state(
            hosted.engine.get_release_state().state,
        ))
    }

    /// Wait for a hosted run to finish and return its outcome
    pub async fn wait(&self, release_id: &EntityId) -> Result<EntityId> {
        let handle = self
            .releases
            .write()
            .get_mut(release_id)
            .and_then(|h| h.handle.take())
            .ok_or_else(|| {
                ReleaseError::InvalidParameter(format!(
                    "release {release_id} is not hosted or has already been awaited"
                ))
            })?;

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(ReleaseError::InternalError(format!(
                "release {release_id} was terminated"
            ))),
            Err(e) => Err(ReleaseError::InternalError(format!(
                "release {release_id} run panicked: {e}"
            ))),
        }
    }

    /// Known release ids, sorted
    pub fn list(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.releases.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.releases.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.read().is_empty()
    }

    pub fn health_check(&self) -> bool {
        let hosted = self.len();
        debug!(hosted, "🩺 Registry health check");
        true
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
