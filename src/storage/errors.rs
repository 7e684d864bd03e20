//! Storage error types
//!
//! Error codes:
//! - AERO_STORAGE_IO_ERROR (ERROR severity)
//! - AERO_STORAGE_WRITE_FAILED (ERROR severity)
//! - AERO_STORAGE_READ_FAILED (ERROR severity)
//! - AERO_STORAGE_CURSOR_MISUSE (ERROR severity)
//! - AERO_STORAGE_RECORD_TOO_LARGE (ERROR severity)
//! - AERO_DATA_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, server continues
    Error,
    /// The table can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Storage unusable for this call (poisoned lock)
    AeroStorageIoError,
    /// Document write failed
    AeroStorageWriteFailed,
    /// Document or column read failed
    AeroStorageReadFailed,
    /// Cursor used out of protocol (no index, not positioned, unknown index)
    AeroStorageCursorMisuse,
    /// Key or column too long for the record format
    AeroStorageRecordTooLarge,
    /// Checksum or framing failure
    AeroDataCorruption,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::AeroStorageIoError => "AERO_STORAGE_IO_ERROR",
            StorageErrorCode::AeroStorageWriteFailed => "AERO_STORAGE_WRITE_FAILED",
            StorageErrorCode::AeroStorageReadFailed => "AERO_STORAGE_READ_FAILED",
            StorageErrorCode::AeroStorageCursorMisuse => "AERO_STORAGE_CURSOR_MISUSE",
            StorageErrorCode::AeroStorageRecordTooLarge => "AERO_STORAGE_RECORD_TOO_LARGE",
            StorageErrorCode::AeroDataCorruption => "AERO_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::AeroDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with code, message and optional context
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StorageError {
    fn with_code(code: StorageErrorCode, message: String, source: Option<io::Error>) -> Self {
        Self {
            code,
            message,
            details: None,
            source,
        }
    }

    /// Create an error for a lock poisoned by a panicking holder.
    ///
    /// Nothing on disk is implicated, so this is never fatal.
    pub fn lock_poisoned(message: impl Into<String>) -> Self {
        Self::with_code(StorageErrorCode::AeroStorageIoError, message.into(), None)
    }

    /// Create a new storage write failed error
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_code(
            StorageErrorCode::AeroStorageWriteFailed,
            message.into(),
            Some(source),
        )
    }

    /// Create a new storage read failed error
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_code(
            StorageErrorCode::AeroStorageReadFailed,
            message.into(),
            Some(source),
        )
    }

    /// Create a cursor protocol error
    pub fn cursor_misuse(message: impl Into<String>) -> Self {
        Self::with_code(StorageErrorCode::AeroStorageCursorMisuse, message.into(), None)
    }

    /// Create an error for a record the on-disk format cannot hold
    pub fn record_too_large(message: impl Into<String>) -> Self {
        Self::with_code(StorageErrorCode::AeroStorageRecordTooLarge, message.into(), None)
    }

    /// Create a new data corruption error (FATAL)
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self::with_code(StorageErrorCode::AeroDataCorruption, message.into(), None)
    }

    /// Create a data corruption error with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        let mut err = Self::data_corruption(reason);
        err.details = Some(format!("byte_offset: {}", offset));
        err
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error means the table is unusable
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
