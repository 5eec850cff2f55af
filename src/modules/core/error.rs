//! Error types for wakalib

use thiserror::Error;

/// Main error type for wakalib operations
#[derive(Error, Debug)]
pub enum WakalibError {
    /// Credential file missing, malformed, invalid, or role absent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database unreachable, authentication rejected, or connection lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution failure reported by the database
    #[error("Query failed: {0}")]
    Query(String),

    /// Caller-supplied arguments do not fit the statement
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WakalibError {
    /// Returns true if this error should be logged at error level
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            WakalibError::Connection(_) | WakalibError::Query(_) | WakalibError::Internal(_)
        )
    }

    /// Returns true if the caller can fix this error by changing its input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WakalibError::Configuration(_) | WakalibError::InvalidArgument(_)
        )
    }

    /// Sanitize the error message to avoid leaking connection details
    pub fn sanitized_message(&self) -> String {
        match self {
            WakalibError::Connection(_) => "Database connection error".to_string(),
            WakalibError::Internal(_) => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type alias using WakalibError
pub type Result<T> = std::result::Result<T, WakalibError>;
