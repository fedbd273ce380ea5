//! Configuration Error Types
//!
//! Error handling for configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration file not found at expected locations
    #[error("Configuration file not found. Searched paths: {searched_paths:?}")]
    ConfigFileNotFound { searched_paths: Vec<PathBuf> },

    /// Source could not be parsed or deserialized into the expected shape
    #[error("Invalid configuration in '{source_name}': {error}")]
    InvalidSource { source_name: String, error: String },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    pub fn invalid_source(source_name: impl Into<String>, error: impl ToString) -> Self {
        Self::InvalidSource {
            source_name: source_name.into(),
            error: error.to_string(),
        }
    }
}

impl From<ConfigurationError> for crate::error::ReleaseError {
    fn from(err: ConfigurationError) -> Self {
        crate::error::ReleaseError::ConfigurationError(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
