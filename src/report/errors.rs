//! # Size Report Errors

use std::io;

use thiserror::Error;

use crate::storage::StorageError;

/// Plain-text body for a missing or malformed threshold
pub const INVALID_REQUEST_MESSAGE: &str = "minSizeInKB query parameter should be provided";

/// Plain-text body when the store cannot be scanned in order
pub const UNSUPPORTED_BACKEND_MESSAGE: &str = "Only ESENT storage supported";

/// Result type for size report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors of the size report.
///
/// The `Display` text is exactly what the client receives as plain text.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Threshold parameter absent or not a non-negative integer
    #[error("minSizeInKB query parameter should be provided")]
    InvalidRequest { reason: String },

    /// Storage does not grant the ordered scan capability
    #[error("Only ESENT storage supported")]
    UnsupportedBackend { engine: String },

    /// Storage fault during cursor setup or iteration
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// Output stream failed, typically a disconnected client
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl ReportError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        ReportError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// HTTP status for errors raised before the response has started
    pub fn status_code(&self) -> u16 {
        match self {
            ReportError::InvalidRequest { .. } => 400,
            ReportError::UnsupportedBackend { .. } => 501,
            ReportError::Storage(_) | ReportError::Io(_) => 500,
        }
    }

    /// Whether the error happened after scanning began
    pub fn is_scan_failure(&self) -> bool {
        matches!(self, ReportError::Storage(_) | ReportError::Io(_))
    }

    /// Short machine-readable reason for logs
    pub fn log_reason(&self) -> String {
        match self {
            ReportError::InvalidRequest { reason } => reason.clone(),
            ReportError::UnsupportedBackend { engine } => format!("engine '{}'", engine),
            ReportError::Storage(e) => e.to_string(),
            ReportError::Io(e) => e.to_string(),
        }
    }
}
