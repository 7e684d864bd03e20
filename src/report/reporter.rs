//! # Streaming Reporter
//!
//! Drives one ordered scan and writes matching records as they are found.
//!
//! ```text
//! Idle -> HeaderWritten -> Scanning -> Draining -> Closed
//!   \__________\_______________\__________\____-> Failed
//! ```
//!
//! The header is written before the read transaction is opened. Each entry
//! is flushed on its own. Nothing is rolled back on failure.

use std::io::Write;
use std::time::{Duration, Instant};

use crate::storage::{Column, DiagnosticCursor, OrderedScanStorage, BY_ETAG_INDEX};

use super::envelope::JsonStreamWriter;
use super::errors::ReportResult;
use super::heartbeat::{Heartbeat, HEARTBEAT_BYTE};
use super::size::{estimate_size, RecordSizeEstimate, ReportEntry};
use super::threshold::ScanRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    Idle,
    HeaderWritten,
    Scanning,
    Draining,
    Closed,
    Failed,
}

/// Counters for one finished (or aborted) scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub records_visited: u64,
    pub entries_reported: u64,
    pub heartbeats_sent: u64,
}

/// Writes one size report to `W`.
pub struct DocumentSizeReporter<W: Write> {
    out: JsonStreamWriter<W>,
    state: ReporterState,
    heartbeat_interval: Duration,
    summary: ScanSummary,
}

impl<W: Write> DocumentSizeReporter<W> {
    pub fn new(out: W, heartbeat_interval: Duration) -> Self {
        Self {
            out: JsonStreamWriter::new(out),
            state: ReporterState::Idle,
            heartbeat_interval,
            summary: ScanSummary::default(),
        }
    }

    pub fn state(&self) -> ReporterState {
        self.state
    }

    /// Counters so far; complete once the reporter is `Closed` or `Failed`.
    pub fn summary(&self) -> ScanSummary {
        self.summary
    }

    /// Run the whole report. Any error leaves the reporter `Failed`.
    pub fn run(&mut self, storage: &dyn OrderedScanStorage, request: &ScanRequest) -> ReportResult<ScanSummary> {
        match self.run_stages(storage, request) {
            Ok(()) => Ok(self.summary),
            Err(e) => {
                self.state = ReporterState::Failed;
                Err(e)
            }
        }
    }

    fn run_stages(&mut self, storage: &dyn OrderedScanStorage, request: &ScanRequest) -> ReportResult<()> {
        self.out.begin_report()?;
        self.state = ReporterState::HeaderWritten;

        {
            let mut batch = storage.begin_read()?;
            let mut cursor = batch.documents()?;
            self.state = ReporterState::Scanning;
            self.scan(cursor.as_mut(), request)?;
        }

        self.state = ReporterState::Draining;
        self.out.finish_report()?;
        self.state = ReporterState::Closed;
        Ok(())
    }

    fn scan(&mut self, cursor: &mut dyn DiagnosticCursor, request: &ScanRequest) -> ReportResult<()> {
        cursor.set_current_index(BY_ETAG_INDEX)?;
        cursor.move_before_first()?;

        let mut heartbeat = Heartbeat::start(self.heartbeat_interval);

        while cursor.move_next()? {
            self.summary.records_visited += 1;

            let size_bytes = estimate_size(
                cursor.column_size(Column::Data)?,
                cursor.column_size(Column::Metadata)?,
            );

            if heartbeat.poll(Instant::now()) {
                self.out.write_whitespace(HEARTBEAT_BYTE)?;
                self.summary.heartbeats_sent = heartbeat.sent();
            }

            if request.admits(size_bytes) {
                let estimate = RecordSizeEstimate {
                    identifier: cursor.column_as_string(Column::Key)?,
                    size_bytes,
                };
                self.out.write_entry(&ReportEntry::from(estimate))?;
                self.out.flush()?;
                self.summary.entries_reported += 1;
            }
        }

        Ok(())
    }

    /// Append `text` to the output as-is. Used for the failure message.
    pub fn write_text(&mut self, text: &str) -> ReportResult<()> {
        self.out.write_text(text)?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> ReportResult<W> {
        Ok(self.out.into_inner()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DocumentStorage, DocumentTable};
    use tempfile::TempDir;

    fn table(docs: &[(&str, usize, usize)]) -> (TempDir, DocumentTable) {
        let dir = TempDir::new().unwrap();
        let table = DocumentTable::open(dir.path()).unwrap();
        for (key, data, metadata) in docs {
            table
                .put(key, Some(vec![b'd'; *data].as_slice()), Some(vec![b'm'; *metadata].as_slice()))
                .unwrap();
        }
        (dir, table)
    }

    #[test]
    fn test_success_path_ends_closed() {
        let (_dir, table) = table(&[("A", 400, 100), ("B", 2000, 48), ("C", 1000, 500)]);
        let mut reporter = DocumentSizeReporter::new(Vec::new(), Duration::from_secs(60));
        assert_eq!(reporter.state(), ReporterState::Idle);

        let request = ScanRequest::from_kib(1).unwrap();
        let summary = reporter.run(&table, &request).unwrap();
        assert_eq!(reporter.state(), ReporterState::Closed);
        assert_eq!(summary.records_visited, 3);
        assert_eq!(summary.entries_reported, 2);

        let out = String::from_utf8(reporter.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            r#"{"DocumentsAndSizes":[{"Id":"B","Size":2048},{"Id":"C","Size":1500}]}"#
        );
    }

    #[test]
    fn test_zero_threshold_reports_every_nonempty_record() {
        let (_dir, table) = table(&[("empty", 0, 0), ("one", 1, 0)]);
        let mut reporter = DocumentSizeReporter::new(Vec::new(), Duration::from_secs(60));
        let summary = reporter
            .run(&table, &ScanRequest::from_kib(0).unwrap())
            .unwrap();
        assert_eq!(summary.entries_reported, 1);
    }

    #[test]
    fn test_write_failure_leaves_reporter_failed() {
        struct Refuse;
        impl Write for Refuse {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let (_dir, table) = table(&[("A", 10, 10)]);
        let mut reporter = DocumentSizeReporter::new(Refuse, Duration::from_secs(60));
        let err = reporter
            .run(&table, &ScanRequest::from_kib(0).unwrap())
            .unwrap_err();
        assert!(err.is_scan_failure());
        assert_eq!(reporter.state(), ReporterState::Failed);
    }
}
