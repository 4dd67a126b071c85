use std::path::PathBuf;

use compact_str::CompactString;
use thiserror::Error;

use crate::client::{ApiError, ClientError};

pub type Result<T> = std::result::Result<T, PulseError>;

#[derive(Debug, Clone, Error)]
pub enum PulseError {
    #[error("Failed to load configuration from: {path}")]
    ConfigLoadError { path: PathBuf, message: String },

    #[error("Invalid configuration: {field}")]
    ConfigValidationError { field: String, message: String },

    #[error("{0}")]
    Fetch(#[from] ApiError),

    #[error("Failed to initialize logging: {0}")]
    LoggingError(CompactString),

    #[error("{0}")]
    GeneralError(CompactString),
}

impl From<ClientError> for PulseError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::ConfigValidation { field, message } => {
                PulseError::config_validation_error(field, message)
            },
            other => PulseError::GeneralError(other.to_string().into()),
        }
    }
}

impl PulseError {
    /// Create a configuration load error
    pub fn config_load_error(path: PathBuf, source: impl std::fmt::Display) -> Self {
        Self::ConfigLoadError { path, message: source.to_string() }
    }

    /// Create a configuration validation error
    pub fn config_validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidationError { field: field.into(), message: message.into() }
    }
}
