//! # Release Configuration System
//!
//! Configuration for the orchestration engine and the access layer in front of it.
//! Every section has production defaults; YAML files only need to carry overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use release_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let timeout = manager.config().client.query_timeout();
//! let burst = manager.config().rate_limiting.default.burst_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring release-config.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Engine timing and default run sizing
    pub engine: EngineConfig,

    /// Resilient client retry and timeout budgets
    pub client: ClientConfig,

    /// Result cache settings
    pub cache: CacheConfig,

    /// Admission control settings
    pub rate_limiting: RateLimitingConfig,

    /// Batch query fan-out bounds
    pub batch: BatchConfig,

    /// Log level and output format
    pub logging: LoggingConfig,
}

/// Engine timing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub setup_interval_ms: u64,
    pub default_app_deploy_time_secs: f64,
    pub default_num_waves: usize,
    pub default_clusters_per_wave: usize,
    pub default_apps_per_bundle: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            setup_interval_ms: constants::engine::SETUP_INTERVAL_MS,
            default_app_deploy_time_secs: constants::engine::DEFAULT_APP_DEPLOY_TIME_SECS,
            default_num_waves: constants::engine::DEFAULT_NUM_WAVES,
            default_clusters_per_wave: constants::engine::DEFAULT_CLUSTERS_PER_WAVE,
            default_apps_per_bundle: constants::engine::DEFAULT_APPS_PER_BUNDLE,
        }
    }
}

impl EngineConfig {
    pub fn setup_interval(&self) -> Duration {
        Duration::from_millis(self.setup_interval_ms)
    }
}

/// Resilient client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub retry_attempts: u32,
    pub query_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub list_max_results: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry_attempts: constants::client::DEFAULT_RETRY_ATTEMPTS,
            query_timeout_ms: constants::client::DEFAULT_QUERY_TIMEOUT_MS,
            backoff_base_ms: constants::client::DEFAULT_BACKOFF_BASE_MS,
            list_max_results: constants::client::DEFAULT_LIST_MAX_RESULTS,
        }
    }
}

impl ClientConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Delay before the attempt that follows `attempt` (1-based): `base * attempt`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: constants::cache::DEFAULT_TTL_SECONDS,
            cleanup_interval_seconds: constants::cache::CLEANUP_INTERVAL_SECONDS,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

/// Token bucket parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BucketConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

/// Admission control configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    pub enabled: bool,
    /// Bucket set applied to ordinary reads
    pub default: BucketConfig,
    /// Stricter bucket set for sensitive operations such as authentication
    pub sensitive: BucketConfig,
    pub cleanup_every_requests: u64,
    pub max_entry_age_seconds: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default: BucketConfig {
                requests_per_minute: constants::rate_limit::DEFAULT_REQUESTS_PER_MINUTE,
                burst_size: constants::rate_limit::DEFAULT_BURST_SIZE,
            },
            sensitive: BucketConfig {
                requests_per_minute: constants::rate_limit::SENSITIVE_REQUESTS_PER_MINUTE,
                burst_size: constants::rate_limit::SENSITIVE_BURST_SIZE,
            },
            cleanup_every_requests: constants::rate_limit::CLEANUP_EVERY_REQUESTS,
            max_entry_age_seconds: constants::rate_limit::MAX_ENTRY_AGE_SECONDS,
        }
    }
}

impl RateLimitingConfig {
    pub fn max_entry_age(&self) -> Duration {
        Duration::from_secs(self.max_entry_age_seconds)
    }
}

/// Batch query configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_concurrent: usize,
    pub hierarchy_max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: constants::client::DEFAULT_BATCH_CONCURRENCY,
            hierarchy_max_concurrent: constants::client::DEFAULT_HIERARCHY_BATCH_CONCURRENCY,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: "json".to_string(),
        }
    }
}

impl ReleaseConfig {
    /// Test-optimized configuration with short intervals and tight budgets
    pub fn for_test() -> Self {
        Self {
            engine: EngineConfig {
                setup_interval_ms: 10,
                default_app_deploy_time_secs: 0.05,
                ..EngineConfig::default()
            },
            client: ClientConfig {
                query_timeout_ms: 200,
                backoff_base_ms: 10,
                ..ClientConfig::default()
            },
            cache: CacheConfig {
                default_ttl_seconds: 1,
                cleanup_interval_seconds: 1,
            },
            logging: LoggingConfig {
                level: "DEBUG".to_string(),
                format: "text".to_string(),
            },
            ..Self::default()
        }
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.client.retry_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "client.retry_attempts",
                "0",
                "at least one attempt is required",
            ));
        }

        if self.client.query_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "client.query_timeout_ms",
                "0",
                "query timeout must be greater than 0",
            ));
        }

        if !self.engine.default_app_deploy_time_secs.is_finite()
            || self.engine.default_app_deploy_time_secs < 0.0
        {
            return Err(ConfigurationError::invalid_value(
                "engine.default_app_deploy_time_secs",
                self.engine.default_app_deploy_time_secs,
                "deploy time must be a non-negative number of seconds",
            ));
        }

        for (field, bucket) in [
            ("rate_limiting.default", &self.rate_limiting.default),
            ("rate_limiting.sensitive", &self.rate_limiting.sensitive),
        ] {
            if bucket.burst_size == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("{field}.burst_size"),
                    "0",
                    "burst size must be at least 1",
                ));
            }
            if bucket.requests_per_minute == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("{field}.requests_per_minute"),
                    "0",
                    "refill rate must be greater than 0",
                ));
            }
        }

        if self.batch.max_concurrent == 0 || self.batch.hierarchy_max_concurrent == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.max_concurrent",
                "0",
                "batch concurrency must be greater than 0",
            ));
        }

        let level = self.logging.level.to_uppercase();
        if !["TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR"].contains(&level.as_str()) {
            return Err(ConfigurationError::invalid_value(
                "logging.level",
                &self.logging.level,
                "must be one of TRACE, DEBUG, INFO, WARN, ERROR",
            ));
        }

        if !["json", "text"].contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ConfigurationError::invalid_value(
                "logging.format",
                &self.logging.format,
                "must be json or text",
            ));
        }

        Ok(())
    }
}
