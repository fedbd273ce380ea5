//! # Batch Query Coordinator
//!
//! Fans one query out to many release runs with bounded concurrency. A failure for
//! one target is recorded against that target and never fails the batch.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::error::ClientError;
use super::resilient_client::ResilientClient;
use crate::config::BatchConfig;
use crate::constants::client::NOT_FOUND_ERROR;
use crate::models::{EntityId, Query, QueryResponse, ReleaseHierarchy};

/// Per-target result of a batch query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome {
    fn ok(data: QueryResponse) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug)]
pub struct BatchQueryCoordinator {
    client: Arc<ResilientClient>,
    config: BatchConfig,
}

impl BatchQueryCoordinator {
    pub fn new(client: Arc<ResilientClient>, config: BatchConfig) -> Self {
        Self { client, config }
    }

    /// Run `query` once per distinct target, keyed by target id
    pub async fn batch_query(&self, target_ids: &[EntityId], query: &Query) -> HashMap<EntityId, BatchOutcome> {
        let mut seen = HashSet::with_capacity(target_ids.len());
        let unique: Vec<EntityId> = target_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        let outcomes = self
            .run_bounded(&unique, query, self.config.max_concurrent)
            .await;
        unique.into_iter().zip(outcomes).collect()
    }

    /// Full hierarchies in input order, `None` wherever the lookup failed
    pub async fn batch_get_release_hierarchies(&self, release_ids: &[EntityId]) -> Vec<Option<ReleaseHierarchy>> {
        self.run_bounded(release_ids, &Query::Hierarchy, self.config.hierarchy_max_concurrent)
            .await
            .into_iter()
            .map(|outcome| outcome.data.and_then(QueryResponse::into_hierarchy))
            .collect()
    }

    async fn run_bounded(&self, target_ids: &[EntityId], query: &Query, limit: usize) -> Vec<BatchOutcome> {
        let semaphore = Arc::new(Semaphore::new(limit.max(1)));
        info!(
            targets = target_ids.len(),
            max_concurrent = limit,
            query = %query,
            "📦 Starting batch query"
        );

        let outcomes = join_all(target_ids.iter().map(|target| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return BatchOutcome::failed(e.to_string()),
                };
                match self.client.query(target, query).await {
                    Ok(response) if response.is_found() => BatchOutcome::ok(response),
                    Ok(_) => BatchOutcome::failed(NOT_FOUND_ERROR),
                    Err(ClientError::NotFound { .. }) => BatchOutcome::failed(NOT_FOUND_ERROR),
                    Err(e) => BatchOutcome::failed(e.to_string()),
                }
            }
        }))
        .await;

        let failed = outcomes.iter().filter(|o| !o.success).count();
        debug!(succeeded = outcomes.len() - failed, failed, "📦 Batch query finished");
        outcomes
    }
}
