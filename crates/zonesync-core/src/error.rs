//! Error types for the zonesync system
//!
//! This module defines all error types used throughout the crate.
//!
//! Errors fall into the classes reported by [`Error::kind`]:
//! configuration problems surface immediately and are never redelivered,
//! remote operation failures are recoverable through the resync channel.

use crate::traits::remote_api::{ApiError, RemoteOp};
use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the zonesync system
#[derive(Error, Debug)]
pub enum Error {
    /// The domain has no usable credential reference
    #[error("Domain {domain} has no credential configured")]
    MissingCredential {
        /// Domain name
        domain: String,
    },

    /// The credential exists but lacks its access or secret key
    #[error("Credential {credential} for domain {domain} is missing its {missing}")]
    IncompleteCredential {
        /// Domain name
        domain: String,
        /// Credential identifier
        credential: String,
        /// Which half of the key pair is absent
        missing: &'static str,
    },

    /// A remote call returned a failure envelope or could not be delivered
    #[error("Remote {operation} failed for {target}: {}", summarize(.errors))]
    RemoteOperation {
        /// The attempted operation
        operation: RemoteOp,
        /// Domain or record the call targeted
        target: String,
        /// Errors reported by the provider (or the transport)
        errors: Vec<ApiError>,
    },

    /// An engine operation was invoked without its preconditions
    #[error("Caller contract violated: {0}")]
    CallerContract(String),

    /// Record store errors
    #[error("Record store error: {0}")]
    RecordStore(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or incomplete configuration; never retried
    Configuration,
    /// The remote provider rejected or failed a call
    RemoteOperation,
    /// Internal misuse of the engine
    CallerContract,
    /// Persistence failures
    Storage,
    /// Everything else
    Other,
}

impl Error {
    /// Create a missing-credential error
    pub fn missing_credential(domain: impl Into<String>) -> Self {
        Self::MissingCredential {
            domain: domain.into(),
        }
    }

    /// Create an incomplete-credential error
    pub fn incomplete_credential(
        domain: impl Into<String>,
        credential: impl Into<String>,
        missing: &'static str,
    ) -> Self {
        Self::IncompleteCredential {
            domain: domain.into(),
            credential: credential.into(),
            missing,
        }
    }

    /// Create a remote operation error from the provider's error payload
    pub fn remote(operation: RemoteOp, target: impl Into<String>, errors: Vec<ApiError>) -> Self {
        Self::RemoteOperation {
            operation,
            target: target.into(),
            errors,
        }
    }

    /// Create a caller contract error
    pub fn caller_contract(msg: impl Into<String>) -> Self {
        Self::CallerContract(msg.into())
    }

    /// Create a record store error
    pub fn record_store(msg: impl Into<String>) -> Self {
        Self::RecordStore(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingCredential { .. } | Error::IncompleteCredential { .. } | Error::Config(_) => {
                ErrorKind::Configuration
            }
            Error::RemoteOperation { .. } | Error::Http(_) => ErrorKind::RemoteOperation,
            Error::CallerContract(_) => ErrorKind::CallerContract,
            Error::RecordStore(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Storage,
            Error::NotFound(_) | Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether redelivering the triggering message may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::RemoteOperation | ErrorKind::Storage)
    }
}

fn summarize(errors: &[ApiError]) -> String {
    if errors.is_empty() {
        return "no error details reported".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
