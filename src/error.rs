// Error types module

use thiserror::Error;

use crate::cache::CacheError;
use crate::fetch::FetchError;

/// Centralized error type for the controller
///
/// Categorizes failures so the HTTP surface can map them to status codes and the
/// logs can tell network trouble apart from storage trouble.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// The network could not be reached and no cached answer exists
    #[error("Network error: {0}")]
    Network(#[from] FetchError),

    /// Cache storage failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// A generation could not be installed; the previous one keeps serving
    #[error("Install of {version} failed: {reason}")]
    Install { version: String, reason: String },

    /// Configuration errors (invalid YAML, missing env vars, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A client message that is not valid JSON or has an unknown type
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// No generation has been activated yet
    #[error("No active cache generation")]
    NoActiveGeneration,
}

impl ControllerError {
    /// HTTP status used when the error reaches the HTTP surface
    pub fn status_code(&self) -> u16 {
        match self {
            ControllerError::Network(FetchError::Timeout { .. }) => 504,
            ControllerError::Network(_) => 502,
            ControllerError::InvalidMessage(_) => 400,
            ControllerError::NoActiveGeneration => 503,
            ControllerError::Cache(_)
            | ControllerError::Install { .. }
            | ControllerError::Config(_) => 500,
        }
    }

    /// Short machine-readable category for logs and JSON error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerError::Network(_) => "network",
            ControllerError::Cache(_) => "cache",
            ControllerError::Install { .. } => "install",
            ControllerError::Config(_) => "config",
            ControllerError::InvalidMessage(_) => "invalid_message",
            ControllerError::NoActiveGeneration => "no_active_generation",
        }
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(err: serde_json::Error) -> Self {
        ControllerError::InvalidMessage(err.to_string())
    }
}
