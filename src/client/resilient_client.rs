//! # Resilient Client
//!
//! Wraps every remote call with a per-attempt timeout, a bounded attempt budget and
//! linear backoff (`base * attempt`). Error handling per attempt:
//!
//! - not found: returned immediately
//! - timeout: retried, then surfaced as [`ClientError::Timeout`]
//! - unavailable / connection: retried, tearing the connection down first
//! - anything else: surfaced immediately as [`ClientError::Unknown`]
//!
//! The connection is opened lazily on first use.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{ClientError, ClientResult, TransportError};
use super::transport::RemoteTransport;
use crate::config::ClientConfig;
use crate::logging::{log_client_operation, log_error};
use crate::models::{EntityId, Query, QueryResponse};
use crate::orchestration::WorkflowStatus;

enum AttemptFailure {
    TimedOut,
    Transient(String),
}

#[derive(Debug)]
pub struct ResilientClient {
    transport: Arc<dyn RemoteTransport>,
    config: ClientConfig,
    connected: Mutex<bool>,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn RemoteTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            connected: Mutex::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open the connection if it is not already open
    pub async fn connect(&self) -> ClientResult<()> {
        let mut connected = self.connected.lock().await;
        if !*connected {
            self.transport
                .connect()
                .await
                .map_err(|e| ClientError::Connection(e.to_string()))?;
            *connected = true;
            info!("🔌 Connected to release service");
        }
        Ok(())
    }

    pub async fn close(&self) {
        let mut connected = self.connected.lock().await;
        if *connected {
            self.transport.close().await;
            *connected = false;
            info!("🔌 Disconnected from release service");
        }
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.lock().await
    }

    async fn reset_connection(&self) {
        let mut connected = self.connected.lock().await;
        if *connected {
            self.transport.close().await;
            *connected = false;
        }
    }

    /// Run `call` under the retry policy
    async fn execute<T, F, Fut>(&self, operation: &str, target: &str, call: F) -> ClientResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let max_attempts = self.config.retry_attempts.max(1);
        let mut last_failure = AttemptFailure::Transient("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.backoff_for(attempt - 1)).await;
            }

            // connecting counts against the same per-attempt budget as the call
            let attempt_result = tokio::time::timeout(self.config.query_timeout(), async {
                self.connect()
                    .await
                    .map_err(|e| TransportError::Unavailable(e.to_string()))?;
                call().await
            })
            .await;

            match attempt_result {
                Ok(Ok(value)) => {
                    log_client_operation(operation, target, attempt, "ok", None);
                    return Ok(value);
                }
                Ok(Err(TransportError::NotFound(_))) => {
                    log_client_operation(operation, target, attempt, "not_found", None);
                    return Err(ClientError::not_found(target));
                }
                Ok(Err(e)) if matches!(e, TransportError::Unavailable(_)) || e.indicates_connection_problem() => {
                    warn!(operation, target, attempt, error = %e, "🔁 Transient failure, reconnecting");
                    self.reset_connection().await;
                    last_failure = AttemptFailure::Transient(e.to_string());
                }
                Ok(Err(e)) => {
                    log_error("resilient_client", operation, &e.to_string(), Some(target));
                    return Err(ClientError::Unknown(e.to_string()));
                }
                Err(_elapsed) => {
                    warn!(
                        operation,
                        target,
                        attempt,
                        timeout_ms = self.config.query_timeout_ms,
                        "⏱️ Attempt timed out"
                    );
                    last_failure = AttemptFailure::TimedOut;
                }
            }
        }

        Err(match last_failure {
            AttemptFailure::TimedOut => ClientError::Timeout {
                operation: operation.to_string(),
                attempts: max_attempts,
            },
            AttemptFailure::Transient(msg) => ClientError::Connection(msg),
        })
    }

    /// Query one release run
    pub async fn query(&self, target: &EntityId, query: &Query) -> ClientResult<QueryResponse> {
        self.execute(query.name(), target.as_str(), || self.transport.query(target, query))
            .await
    }

    /// Query by operation name, validating the name and its arguments first
    pub async fn query_named(
        &self,
        target: &EntityId,
        operation: &str,
        args: &[String],
    ) -> ClientResult<QueryResponse> {
        let query = Query::parse(operation, args)?;
        self.query(target, &query).await
    }

    /// External lifecycle status of a release run
    pub async fn get_workflow_status(&self, target: &EntityId) -> ClientResult<WorkflowStatus> {
        self.execute("describe", target.as_str(), || self.transport.describe(target))
            .await
    }

    pub async fn list_workflows(&self, max_results: Option<usize>) -> ClientResult<Vec<EntityId>> {
        let max_results = max_results.unwrap_or(self.config.list_max_results);
        self.execute("list", "*", || self.transport.list(max_results))
            .await
    }

    /// Whether the service answers at all; never retried
    pub async fn health_check(&self) -> bool {
        let check = async {
            self.connect()
                .await
                .map_err(|e| TransportError::Unavailable(e.to_string()))?;
            self.transport.health_check().await
        };
        match tokio::time::timeout(self.config.query_timeout(), check).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                debug!(error = %e, "Health check failed");
                false
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` queries with the given error, then succeeds
    #[derive(Debug)]
    struct FlakyTransport {
        failures: u32,
        error: TransportError,
        calls: AtomicU32,
        connects: AtomicU32,
    }

    impl FlakyTransport {
        fn new(failures: u32, error: TransportError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
                connects: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteTransport for FlakyTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) {}

        async fn query(&self, _target: &EntityId, _query: &Query) -> Result<QueryResponse, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(self.error.clone());
            }
            Ok(QueryResponse::Wave(None))
        }

        async fn describe(&self, _target: &EntityId) -> Result<WorkflowStatus, TransportError> {
            Ok(WorkflowStatus::Running)
        }

        async fn list(&self, _max_results: usize) -> Result<Vec<EntityId>, TransportError> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<bool, TransportError> {
            Ok(true)
        }
    }

    fn fast_config() -> ClientConfig {
        ClientConfig {
            retry_attempts: 3,
            query_timeout_ms: 100,
            backoff_base_ms: 10,
            list_max_results: 100,
        }
    }

    fn target() -> EntityId {
        EntityId::parse("release:r1").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_errors_retry_and_reconnect() {
        let transport = Arc::new(FlakyTransport::new(2, TransportError::Unavailable("down".into())));
        let client = ResilientClient::new(transport.clone(), fast_config());

        let response = client.query(&target(), &Query::Hierarchy).await.unwrap();
        assert!(!response.is_found());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let transport = Arc::new(FlakyTransport::new(5, TransportError::NotFound("release:r1".into())));
        let client = ResilientClient::new(transport.clone(), fast_config());

        let err = client.query(&target(), &Query::ReleaseState).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_errors_surface_immediately() {
        let transport = Arc::new(FlakyTransport::new(5, TransportError::Other("bad payload".into())));
        let client = ResilientClient::new(transport.clone(), fast_config());

        let err = client.query(&target(), &Query::ReleaseState).await.unwrap_err();
        assert!(matches!(err, ClientError::Unknown(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_connection_budget_is_connection_error() {
        let transport = Arc::new(FlakyTransport::new(10, TransportError::Unavailable("down".into())));
        let client = ResilientClient::new(transport.clone(), fast_config());

        let start = tokio::time::Instant::now();
        let err = client.query(&target(), &Query::ReleaseState).await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        // backoff of 10ms then 20ms
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    /// Never finishes connecting
    #[derive(Debug, Default)]
    struct HangingConnectTransport {
        connects: AtomicU32,
    }

    #[async_trait]
    impl RemoteTransport for HangingConnectTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn close(&self) {}

        async fn query(&self, _target: &EntityId, _query: &Query) -> Result<QueryResponse, TransportError> {
            Ok(QueryResponse::Wave(None))
        }

        async fn describe(&self, _target: &EntityId) -> Result<WorkflowStatus, TransportError> {
            Ok(WorkflowStatus::Running)
        }

        async fn list(&self, _max_results: usize) -> Result<Vec<EntityId>, TransportError> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<bool, TransportError> {
            Ok(true)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_connect_is_bounded_by_attempt_timeout() {
        let transport = Arc::new(HangingConnectTransport::default());
        let client = ResilientClient::new(transport.clone(), fast_config());

        let start = tokio::time::Instant::now();
        let err = client.query(&target(), &Query::ReleaseState).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { attempts: 3, .. }));
        assert_eq!(transport.connects.load(Ordering::SeqCst), 3);
        // 3 x 100ms attempts plus 10ms and 20ms backoff
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!client.is_connected().await);
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_invalid_named_query_is_rejected_locally() {
        let transport = Arc::new(FlakyTransport::new(0, TransportError::Other(String::new())));
        let client = ResilientClient::new(transport.clone(), fast_config());

        let err = client
            .query_named(&target(), "get_wave_state", &["app:x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(client.health_check().await);
    }
}
