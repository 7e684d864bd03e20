//! # Size Report Responder
//!
//! Entry point shared by the HTTP route and the CLI. Work is split in two
//! so the caller can choose a status code before any body byte is sent:
//!
//! 1. [`DocumentSizeResponder::prepare`] validates the threshold, then the
//!    storage capability. Nothing is opened here.
//! 2. [`PreparedScan::stream`] writes the report. Once it starts the
//!    response is committed; a later failure is appended as plain text.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::storage::DocumentStorage;

use super::errors::{ReportError, ReportResult};
use super::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use super::reporter::{DocumentSizeReporter, ScanSummary};
use super::threshold::ScanRequest;

const SCAN_SCOPE: &str = "DOC_SIZE_SCAN";

/// Serves size reports for one storage instance.
#[derive(Clone)]
pub struct DocumentSizeResponder {
    storage: Arc<dyn DocumentStorage>,
    heartbeat_interval: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl DocumentSizeResponder {
    pub fn new(storage: Arc<dyn DocumentStorage>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            storage,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            metrics,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Validate a request. The threshold is checked before the engine, so a
    /// bad parameter is reported as such on every backend.
    pub fn prepare(&self, query: &HashMap<String, String>) -> ReportResult<PreparedScan> {
        let request = match ScanRequest::from_query(query) {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };

        if self.storage.as_ordered_scan().is_none() {
            return Err(self.reject(ReportError::UnsupportedBackend {
                engine: self.storage.engine().to_string(),
            }));
        }

        Ok(PreparedScan {
            storage: Arc::clone(&self.storage),
            request,
            heartbeat_interval: self.heartbeat_interval,
            metrics: Arc::clone(&self.metrics),
            scan_id: Uuid::new_v4(),
        })
    }

    /// Prepare and stream in one call, writing rejections to `out` as text.
    pub fn respond<W: Write>(&self, query: &HashMap<String, String>, mut out: W) -> ReportResult<ScanSummary> {
        match self.prepare(query) {
            Ok(scan) => scan.stream(out),
            Err(e) => {
                out.write_all(e.to_string().as_bytes())?;
                out.flush()?;
                Err(e)
            }
        }
    }

    fn reject(&self, err: ReportError) -> ReportError {
        self.metrics.increment_scans_rejected();
        let status = err.status_code().to_string();
        let reason = err.log_reason();
        log_event_with_fields(Event::ScanRejected, &[("status", &status), ("reason", &reason)]);
        err
    }
}

/// A validated request, ready to stream.
pub struct PreparedScan {
    storage: Arc<dyn DocumentStorage>,
    request: ScanRequest,
    heartbeat_interval: Duration,
    metrics: Arc<MetricsRegistry>,
    scan_id: Uuid,
}

impl PreparedScan {
    pub fn request(&self) -> &ScanRequest {
        &self.request
    }

    pub fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    /// Write the full report to `out`.
    ///
    /// Blocking: the HTTP layer runs this on the blocking pool. On error the
    /// message has already been appended to `out` when `out` still accepts it.
    pub fn stream<W: Write>(self, out: W) -> ReportResult<ScanSummary> {
        let mut reporter = DocumentSizeReporter::new(out, self.heartbeat_interval);

        let Some(ordered) = self.storage.as_ordered_scan() else {
            let err = ReportError::UnsupportedBackend {
                engine: self.storage.engine().to_string(),
            };
            let _ = reporter.write_text(&err.to_string());
            return Err(err);
        };

        let scope = ObservationScope::with_fields(
            SCAN_SCOPE,
            vec![
                ("scan_id", self.scan_id.to_string()),
                ("engine", self.storage.engine().to_string()),
                ("min_size_bytes", self.request.min_size_bytes().to_string()),
            ],
        );
        self.metrics.increment_scans_started();

        let result = reporter.run(ordered, &self.request);
        let summary = reporter.summary();
        self.metrics.add_records_visited(summary.records_visited);
        self.metrics.add_entries_reported(summary.entries_reported);
        self.metrics.add_heartbeats_sent(summary.heartbeats_sent);

        let visited = summary.records_visited.to_string();
        let reported = summary.entries_reported.to_string();
        let heartbeats = summary.heartbeats_sent.to_string();
        let counts = [
            ("records_visited", visited.as_str()),
            ("entries_reported", reported.as_str()),
            ("heartbeats_sent", heartbeats.as_str()),
        ];

        match result {
            Ok(summary) => {
                self.metrics.increment_scans_completed();
                scope.complete(&counts);
                Ok(summary)
            }
            Err(e) => {
                self.metrics.increment_scans_failed();
                if let ReportError::Storage(storage_err) = &e {
                    if storage_err.is_fatal() {
                        let scan_id = self.scan_id.to_string();
                        log_event_with_fields(
                            Event::TableCorruption,
                            &[("scan_id", &scan_id), ("error", &storage_err.to_string())],
                        );
                    }
                }
                // The client may be gone; the message is best effort.
                let _ = reporter.write_text(&e.to_string());
                scope.fail(&e.log_reason(), &counts);
                Err(e)
            }
        }
    }
}
