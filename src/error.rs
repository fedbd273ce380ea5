use thiserror::Error;

/// Crate-wide error type for hierarchy construction and release execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReleaseError {
    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("State transition error: {0}")]
    StateTransitionError(String),

    /// A deployment unit failed; never retried by the engine
    #[error("{message}")]
    DeploymentFailed { entity_id: String, message: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ReleaseError {
    pub fn deployment_failed(entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeploymentFailed {
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }

    /// Domain failures are raised deliberately by a deployment unit and carry their own message
    pub fn is_domain_failure(&self) -> bool {
        matches!(self, Self::DeploymentFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReleaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_failure_display_is_raw_message() {
        let err = ReleaseError::deployment_failed("app:x-app-2", "App deployment failed: app:x-app-2");
        assert_eq!(err.to_string(), "App deployment failed: app:x-app-2");
        assert!(err.is_domain_failure());
        assert!(!ReleaseError::InternalError("boom".into()).is_domain_failure());
    }
}
