//! Error types for redeliver-core

use thiserror::Error;

use crate::retry::RetryError;

/// Result type alias using redeliver-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for redeliver
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format or value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Retry engine error (invalid policy, failed recovery)
    #[error(transparent)]
    Retry(#[from] RetryError),

    /// A broker client could not be constructed
    #[error("Failed to create client '{client_id}': {message}")]
    ClientCreation { client_id: String, message: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a client creation error
    ///
    /// Clients without a configured id are reported as `<unnamed>`.
    pub fn client_creation(client_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::ClientCreation {
            client_id: client_id.unwrap_or("<unnamed>").to_string(),
            message: message.into(),
        }
    }
}
