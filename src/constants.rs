//! # System Constants
//!
//! Default tunables that define the operational boundaries of a release run and of
//! the access layer in front of it. Configuration sections fall back to these.

/// Entity kind prefixes used in identifiers (`<kind>:<token>`)
pub mod kinds {
    pub const RELEASE: &str = "release";
    pub const WAVE: &str = "wave";
    pub const CLUSTER: &str = "cluster";
    pub const BUNDLE: &str = "bundle";
    pub const APP: &str = "app";
}

/// Identifier limits
pub mod ids {
    /// Maximum total identifier length, prefix included
    pub const MAX_ENTITY_ID_LENGTH: usize = 200;
}

/// Engine timing and sizing defaults
pub mod engine {
    /// Pause taken by a wave, cluster or bundle before touching its children
    pub const SETUP_INTERVAL_MS: u64 = 500;
    pub const DEFAULT_APP_DEPLOY_TIME_SECS: f64 = 4.0;
    pub const DEFAULT_NUM_WAVES: usize = 2;
    pub const DEFAULT_CLUSTERS_PER_WAVE: usize = 2;
    pub const DEFAULT_APPS_PER_BUNDLE: usize = 3;
    /// Apps whose id contains this marker fail under the `app_failure` scenario
    pub const APP_FAILURE_MARKER: &str = "app-2";
    /// Upper bound on waves + clusters + bundles + apps in one release
    pub const MAX_ENTITIES_PER_RELEASE: usize = 100_000;
    pub const CANCELLED_MESSAGE: &str = "Release cancelled by user";
}

/// Access layer defaults
pub mod client {
    pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
    pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
    pub const DEFAULT_LIST_MAX_RESULTS: usize = 1_000;
    pub const DEFAULT_BATCH_CONCURRENCY: usize = 10;
    pub const DEFAULT_HIERARCHY_BATCH_CONCURRENCY: usize = 5;
    /// Error text recorded by batch queries for missing targets
    pub const NOT_FOUND_ERROR: &str = "not_found";
}

/// Result cache defaults
pub mod cache {
    pub const DEFAULT_TTL_SECONDS: u64 = 10;
    pub const CLEANUP_INTERVAL_SECONDS: u64 = 60;
    pub const RELEASE_LIST_KEY: &str = "releases:all";
}

/// Rate limiting defaults
pub mod rate_limit {
    pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
    pub const DEFAULT_BURST_SIZE: u32 = 10;
    pub const SENSITIVE_REQUESTS_PER_MINUTE: u32 = 10;
    pub const SENSITIVE_BURST_SIZE: u32 = 3;
    pub const CLEANUP_EVERY_REQUESTS: u64 = 1_000;
    pub const MAX_ENTRY_AGE_SECONDS: u64 = 3_600;
}
