//! Domain error types
//!
//! This module defines the error hierarchy for Courier.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Courier error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Data-access errors raised while querying primary or secondary data
    #[error("Data access error: {0}")]
    DataAccess(#[from] DataAccessError),

    /// Deployment transport errors
    #[error("Deployment error: {0}")]
    Deployment(#[from] DeploymentError),

    /// Database-related errors (generic)
    #[error("Database error: {0}")]
    Database(String),

    /// A batched secondary-data load failed; the page cannot be rendered
    #[error("Secondary data load failed: {0}")]
    DataLoad(String),

    /// Rendering/mapping failure for a single record
    #[error("Record error: {0}")]
    Record(String),

    /// The process ran out of memory while handling a record
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Export process errors
    #[error("Export error: {0}")]
    Export(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Checkpoint persistence errors
    #[error("State management error: {0}")]
    State(String),

    /// The run was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl CourierError {
    /// True when the error must escalate to a hard abort of the run
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, CourierError::OutOfMemory(_))
    }

    /// True for errors that must never be swallowed as a per-record failure
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CourierError::DataLoad(_)
                | CourierError::DataAccess(_)
                | CourierError::Database(_)
                | CourierError::Connection(_)
                | CourierError::OutOfMemory(_)
                | CourierError::Cancelled
        )
    }
}

/// Data-access errors
///
/// Errors raised by store adapters. These don't expose driver types.
#[derive(Debug, Error)]
pub enum DataAccessError {
    /// Failed to obtain a connection
    #[error("Failed to connect: {0}")]
    ConnectionFailed(String),

    /// Query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A row could not be mapped to a domain type
    #[error("Invalid row for {entity}: {message}")]
    InvalidRow { entity: String, message: String },
}

/// Deployment-specific errors
///
/// Errors that occur while delivering an artifact to a destination.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// The artifact to publish does not exist on disk
    #[error("Artifact not found: {0}")]
    ArtifactMissing(String),

    /// Destination configuration is unusable
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// Could not reach or authenticate against the destination
    #[error("Failed to connect to destination: {0}")]
    ConnectionFailed(String),

    /// One or more files could not be delivered
    #[error("Uploaded {uploaded} of {total} file(s): {message}")]
    PartialUpload {
        uploaded: usize,
        total: usize,
        message: String,
    },

    /// HTTP destination answered with a non-success status
    #[error("HTTP {status} {reason}: {body}")]
    HttpStatus {
        status: u16,
        reason: String,
        body: String,
    },

    /// No valid e-mail recipient was configured
    #[error("No valid e-mail recipient in '{0}'")]
    NoRecipients(String),

    /// Writing to the outbound e-mail queue failed
    #[error("Failed to queue e-mail: {0}")]
    QueueFailed(String),

    /// Filesystem copy failed
    #[error("Failed to copy artifact: {0}")]
    CopyFailed(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for CourierError {
    fn from(err: std::io::Error) -> Self {
        CourierError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        CourierError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CourierError {
    fn from(err: toml::de::Error) -> Self {
        CourierError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<zip::result::ZipError> for CourierError {
    fn from(err: zip::result::ZipError) -> Self {
        CourierError::Io(format!("Zip archive error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_courier_error_display() {
        let err = CourierError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_deployment_error_conversion() {
        let err = DeploymentError::ConnectionFailed("refused".to_string());
        let courier_err: CourierError = err.into();
        assert!(matches!(courier_err, CourierError::Deployment(_)));
    }

    #[test]
    fn test_http_status_display_carries_diagnostics() {
        let err = DeploymentError::HttpStatus {
            status: 503,
            reason: "Service Unavailable".to_string(),
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 Service Unavailable: maintenance");
    }

    #[test]
    fn test_error_classification() {
        assert!(CourierError::OutOfMemory("x".to_string()).is_out_of_memory());
        assert!(CourierError::OutOfMemory("x".to_string()).is_structural());
        assert!(CourierError::DataLoad("x".to_string()).is_structural());
        assert!(!CourierError::DataLoad("x".to_string()).is_out_of_memory());
        assert!(!CourierError::Record("x".to_string()).is_structural());
        assert!(!CourierError::Other("x".to_string()).is_structural());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let courier_err: CourierError = io_err.into();
        assert!(matches!(courier_err, CourierError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let courier_err: CourierError = toml_err.into();
        assert!(matches!(courier_err, CourierError::Configuration(_)));
        assert!(courier_err.to_string().contains("TOML parse error"));
    }
}
