//! # Remote Transport
//!
//! The seam between the access layer and wherever release runs are hosted.
//! [`LocalTransport`] talks to an in-process [`EngineRegistry`]; tests swap in
//! their own implementations to simulate slow or broken services.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::error::TransportError;
use crate::models::{EntityId, Query, QueryResponse};
use crate::orchestration::{EngineRegistry, WorkflowStatus};

#[async_trait]
pub trait RemoteTransport: Send + Sync + Debug {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn close(&self);

    /// Run a named query against one hosted release
    async fn query(&self, target: &EntityId, query: &Query) -> Result<QueryResponse, TransportError>;

    /// External lifecycle status of one hosted release
    async fn describe(&self, target: &EntityId) -> Result<WorkflowStatus, TransportError>;

    /// Ids of hosted releases, at most `max_results`
    async fn list(&self, max_results: usize) -> Result<Vec<EntityId>, TransportError>;

    async fn health_check(&self) -> Result<bool, TransportError>;
}

/// Transport over an in-process registry
#[derive(Debug)]
pub struct LocalTransport {
    registry: Arc<EngineRegistry>,
    connected: AtomicBool,
}

impl LocalTransport {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            connected: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Unavailable("connection is closed".to_string()))
        }
    }
}

#[async_trait]
impl RemoteTransport for LocalTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        debug!("🔌 Local transport connected");
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        debug!("🔌 Local transport closed");
    }

    async fn query(&self, target: &EntityId, query: &Query) -> Result<QueryResponse, TransportError> {
        self.ensure_open()?;
        let engine = self
            .registry
            .get(target)
            .ok_or_else(|| TransportError::NotFound(target.to_string()))?;
        engine
            .answer(query)
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    async fn describe(&self, target: &EntityId) -> Result<WorkflowStatus, TransportError> {
        self.ensure_open()?;
        self.registry
            .describe(target)
            .ok_or_else(|| TransportError::NotFound(target.to_string()))
    }

    async fn list(&self, max_results: usize) -> Result<Vec<EntityId>, TransportError> {
        self.ensure_open()?;
        Ok(self.registry.list().into_iter().take(max_results).collect())
    }

    async fn health_check(&self) -> Result<bool, TransportError> {
        self.ensure_open()?;
        Ok(self.registry.health_check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_transport_is_unavailable() {
        let transport = LocalTransport::new(Arc::new(EngineRegistry::default()));
        let err = transport.list(10).await.unwrap_err();
        assert!(err.indicates_connection_problem());

        transport.connect().await.unwrap();
        assert!(transport.list(10).await.unwrap().is_empty());

        let missing = EntityId::parse("release:ghost").unwrap();
        assert!(matches!(
            transport.describe(&missing).await,
            Err(TransportError::NotFound(_))
        ));
    }
}
