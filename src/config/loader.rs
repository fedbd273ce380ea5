//! Configuration Loader
//!
//! Environment-aware configuration loading. Defaults are layered under
//! `release-config.yaml`, which is layered under `release-config.<env>.yaml`.

use super::error::{ConfigResult, ConfigurationError};
use super::ReleaseConfig;
use config::{Config, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const BASE_CONFIG_FILE: &str = "release-config.yaml";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: ReleaseConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            config_directory = %config_directory.display(),
            retry_attempts = config.client.retry_attempts,
            rate_limiting_enabled = config.rate_limiting.enabled,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: ReleaseConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the environment name (lower-cased), defaulting to development
    pub fn detect_environment() -> String {
        env::var("RELEASE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<ReleaseConfig> {
        let base_file = config_directory.join(BASE_CONFIG_FILE);
        if !base_file.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound {
                searched_paths: vec![base_file],
            });
        }
        let env_file = config_directory.join(format!("release-config.{environment}.yaml"));

        let defaults = Config::try_from(&ReleaseConfig::default())
            .map_err(|e| ConfigurationError::invalid_source("defaults", e))?;

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file.clone()).required(true))
            .add_source(File::from(env_file.clone()).required(false))
            .build()
            .map_err(|e| ConfigurationError::invalid_source(base_file.display().to_string(), e))?;

        if env_file.is_file() {
            debug!(
                "Applying environment-specific overrides from: {}",
                env_file.display()
            );
        }

        merged
            .try_deserialize::<ReleaseConfig>()
            .map_err(|e| ConfigurationError::invalid_source(base_file.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_base_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(BASE_CONFIG_FILE),
            "client:\n  retry_attempts: 5\ncache:\n  default_ttl_seconds: 30\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("release-config.test.yaml"),
            "cache:\n  default_ttl_seconds: 2\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().client.retry_attempts, 5);
        assert_eq!(manager.config().cache.default_ttl_seconds, 2);
        // untouched sections keep their defaults
        assert_eq!(manager.config().rate_limiting.default.burst_size, 10);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(BASE_CONFIG_FILE),
            "client:\n  retry_attempts: 0\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }
}
