//! Run parameters and failure scenarios for a single release run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::constants::engine::APP_FAILURE_MARKER;
use crate::error::{ReleaseError, Result};
use crate::models::EntityId;
use crate::orchestration::HierarchyBuilder;

/// Simulated failure injected at the leaves of the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailScenario {
    #[default]
    None,
    /// Every app whose id contains `app-2` fails after its deploy pause
    AppFailure,
}

impl FailScenario {
    pub fn should_fail(&self, app_id: &EntityId) -> bool {
        match self {
            Self::None => false,
            Self::AppFailure => app_id.as_str().contains(APP_FAILURE_MARKER),
        }
    }
}

impl fmt::Display for FailScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::AppFailure => write!(f, "app_failure"),
        }
    }
}

impl std::str::FromStr for FailScenario {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "app_failure" => Ok(Self::AppFailure),
            other => Err(ReleaseError::InvalidParameter(format!(
                "unknown fail scenario '{other}'"
            ))),
        }
    }
}

/// Sizing and timing of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub num_waves: usize,
    pub clusters_per_wave: usize,
    pub apps_per_bundle: usize,
    pub app_deploy_time: Duration,
    pub fail_scenario: FailScenario,
}

impl RunParameters {
    /// Build parameters from untrusted values, rejecting negative counts and durations
    /// and trees too large to materialize
    pub fn new(
        num_waves: i64,
        clusters_per_wave: i64,
        apps_per_bundle: i64,
        app_deploy_time_secs: f64,
        fail_scenario: &str,
    ) -> Result<Self> {
        let count = |name: &str, value: i64| -> Result<usize> {
            usize::try_from(value).map_err(|_| {
                ReleaseError::InvalidParameter(format!("{name} must be non-negative, got {value}"))
            })
        };
        let app_deploy_time = Duration::try_from_secs_f64(app_deploy_time_secs).map_err(|_| {
            ReleaseError::InvalidParameter(format!(
                "app_deploy_time must be a non-negative number of seconds, got {app_deploy_time_secs}"
            ))
        })?;

        let params = Self {
            num_waves: count("num_waves", num_waves)?,
            clusters_per_wave: count("clusters_per_wave", clusters_per_wave)?,
            apps_per_bundle: count("apps_per_bundle", apps_per_bundle)?,
            app_deploy_time,
            fail_scenario: fail_scenario.parse()?,
        };
        HierarchyBuilder::new(params.num_waves, params.clusters_per_wave, params.apps_per_bundle)
            .entity_count()?;
        Ok(params)
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            num_waves: config.default_num_waves,
            clusters_per_wave: config.default_clusters_per_wave,
            apps_per_bundle: config.default_apps_per_bundle,
            app_deploy_time: Duration::try_from_secs_f64(config.default_app_deploy_time_secs)
                .unwrap_or_default(),
            fail_scenario: FailScenario::None,
        }
    }

    pub fn with_fail_scenario(mut self, fail_scenario: FailScenario) -> Self {
        self.fail_scenario = fail_scenario;
        self
    }

    pub fn with_app_deploy_time(mut self, app_deploy_time: Duration) -> Self {
        self.app_deploy_time = app_deploy_time;
        self
    }
}

impl Default for RunParameters {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_negative_values() {
        assert!(RunParameters::new(-1, 2, 3, 1.0, "none").is_err());
        assert!(RunParameters::new(1, -2, 3, 1.0, "none").is_err());
        assert!(RunParameters::new(1, 2, 3, -0.5, "none").is_err());
        assert!(RunParameters::new(1, 2, 3, 1.0, "random").is_err());
        assert!(matches!(
            RunParameters::new(1 << 40, 1 << 40, 1, 0.0, "none"),
            Err(ReleaseError::InvalidParameter(_))
        ));

        let params = RunParameters::new(2, 2, 3, 1.5, "app_failure").unwrap();
        assert_eq!(params.app_deploy_time, Duration::from_millis(1500));
        assert_eq!(params.fail_scenario, FailScenario::AppFailure);
    }

    #[test]
    fn test_defaults_match_engine_config() {
        let params = RunParameters::default();
        assert_eq!(params.num_waves, 2);
        assert_eq!(params.clusters_per_wave, 2);
        assert_eq!(params.apps_per_bundle, 3);
        assert_eq!(params.app_deploy_time, Duration::from_secs(4));
        assert_eq!(params.fail_scenario, FailScenario::None);
    }

    #[test]
    fn test_app_failure_targets_second_app() {
        let second = EntityId::parse("app:cluster-1-1-bundle-app-2").unwrap();
        let first = EntityId::parse("app:cluster-1-1-bundle-app-1").unwrap();
        assert!(FailScenario::AppFailure.should_fail(&second));
        assert!(!FailScenario::AppFailure.should_fail(&first));
        assert!(!FailScenario::None.should_fail(&second));
    }
}
