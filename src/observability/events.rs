//! Observable lifecycle events
//!
//! Events are explicit and typed. Scans themselves are traced through
//! [`super::ObservationScope`] (`DOC_SIZE_SCAN_BEGIN` / `_COMPLETE` / `_FAILED`).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Process startup begins
    StartupBegin,
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Storage engine opened
    StorageOpened,
    /// HTTP server is accepting requests
    Serving,
    /// HTTP server stopped
    ShutdownComplete,

    // Data directory
    /// Data directory created
    DataDirInitialized,

    // Writes
    /// Document stored
    DocumentPut,
    /// Document deleted
    DocumentDeleted,

    // Diagnostics
    /// Size report request rejected before scanning
    ScanRejected,
    /// Table failed verification (FATAL)
    TableCorruption,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StartupBegin => "DOCSTATS_STARTUP_BEGIN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StorageOpened => "STORAGE_OPENED",
            Event::Serving => "DOCSTATS_SERVING",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::DataDirInitialized => "DATA_DIR_INITIALIZED",
            Event::DocumentPut => "DOCUMENT_PUT",
            Event::DocumentDeleted => "DOCUMENT_DELETED",
            Event::ScanRejected => "DOC_SIZE_SCAN_REJECTED",
            Event::TableCorruption => "TABLE_CORRUPTION",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::TableCorruption)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::StartupBegin,
            Event::ConfigLoaded,
            Event::StorageOpened,
            Event::Serving,
            Event::ShutdownComplete,
            Event::DataDirInitialized,
            Event::DocumentPut,
            Event::DocumentDeleted,
            Event::ScanRejected,
            Event::TableCorruption,
        ];
        for event in events {
            assert!(event.as_str().chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_only_corruption_is_fatal() {
        assert!(Event::TableCorruption.is_fatal());
        assert!(!Event::ScanRejected.is_fatal());
    }
}
