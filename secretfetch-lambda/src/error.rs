//! Secret retrieval errors
//!
//! Every failure ends up as the response body, so the `Display` text of each
//! variant is what callers see.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// `SECRET_NAME` is unset, so the request carries no secret id
    #[error(
        "Parameter validation failed:\nInvalid type for parameter SecretId, value: None, \
         type: <class 'NoneType'>, valid types: <class 'str'>"
    )]
    MissingSecretId,

    #[error("An error occurred ({code}) when calling the {operation} operation: {message}")]
    Service {
        operation: &'static str,
        code: String,
        message: String,
    },

    #[error("Could not connect to the endpoint URL: {0}")]
    Connection(String),

    #[error("Read timeout on endpoint URL: {0}")]
    Timeout(String),

    /// The secret only carries a binary payload
    #[error("'SecretString'")]
    MissingSecretString,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("{0}")]
    Client(String),
}

impl From<config::ConfigError> for RetrievalError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
