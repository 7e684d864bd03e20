//! Size Report Tests Against a Scripted Storage
//!
//! Cover behavior a real table makes hard to provoke:
//! - Slow cursors and heartbeats
//! - Storage failure in the middle of a scan
//! - A client that stops reading
//! - When the read transaction is opened and released

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use aerodb_docstats::observability::MetricsRegistry;
use aerodb_docstats::report::{DocumentSizeResponder, ReportError, INVALID_REQUEST_MESSAGE, MIN_SIZE_PARAM};
use aerodb_docstats::storage::{
    Column, DiagnosticCursor, DocumentStorage, OrderedScanStorage, ReadBatch, StorageEngineKind,
    StorageError, StorageResult, StoredDocument, BY_ETAG_INDEX,
};

// =============================================================================
// Scripted Storage
// =============================================================================

#[derive(Default)]
struct FakeStorage {
    /// (key, data length, metadata length) in etag order
    records: Vec<(String, Option<u64>, Option<u64>)>,
    step_delay: Duration,
    fail_at: Option<usize>,
    batches_opened: AtomicUsize,
    batches_open: AtomicUsize,
    moves: AtomicUsize,
    key_reads: AtomicUsize,
}

impl FakeStorage {
    fn with_sizes(sizes: &[u64]) -> Self {
        Self {
            records: sizes
                .iter()
                .enumerate()
                .map(|(i, size)| (format!("r{}", i), Some(*size), None))
                .collect(),
            ..Default::default()
        }
    }
}

impl DocumentStorage for FakeStorage {
    fn engine(&self) -> StorageEngineKind {
        StorageEngineKind::Esent
    }

    fn put(&self, _key: &str, _data: Option<&[u8]>, _metadata: Option<&[u8]>) -> StorageResult<u64> {
        Err(StorageError::cursor_misuse("scripted storage is read-only"))
    }

    fn delete(&self, _key: &str) -> StorageResult<bool> {
        Err(StorageError::cursor_misuse("scripted storage is read-only"))
    }

    fn get(&self, _key: &str) -> StorageResult<Option<StoredDocument>> {
        Ok(None)
    }

    fn document_count(&self) -> usize {
        self.records.len()
    }

    fn as_ordered_scan(&self) -> Option<&dyn OrderedScanStorage> {
        Some(self)
    }
}

impl OrderedScanStorage for FakeStorage {
    fn begin_read(&self) -> StorageResult<Box<dyn ReadBatch + '_>> {
        self.batches_opened.fetch_add(1, Ordering::SeqCst);
        self.batches_open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBatch { storage: self }))
    }
}

struct FakeBatch<'a> {
    storage: &'a FakeStorage,
}

impl ReadBatch for FakeBatch<'_> {
    fn documents(&mut self) -> StorageResult<Box<dyn DiagnosticCursor + '_>> {
        Ok(Box::new(FakeCursor {
            storage: self.storage,
            index_set: false,
            next: None,
        }))
    }
}

impl Drop for FakeBatch<'_> {
    fn drop(&mut self) {
        self.storage.batches_open.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakeCursor<'a> {
    storage: &'a FakeStorage,
    index_set: bool,
    /// Index of the record the cursor is on, once moved
    next: Option<usize>,
}

impl FakeCursor<'_> {
    fn current(&self) -> StorageResult<&(String, Option<u64>, Option<u64>)> {
        self.next
            .and_then(|i| self.storage.records.get(i))
            .ok_or_else(|| StorageError::cursor_misuse("not on a record"))
    }
}

impl DiagnosticCursor for FakeCursor<'_> {
    fn set_current_index(&mut self, index: &str) -> StorageResult<()> {
        assert_eq!(index, BY_ETAG_INDEX);
        self.index_set = true;
        Ok(())
    }

    fn move_before_first(&mut self) -> StorageResult<()> {
        assert!(self.index_set);
        self.next = None;
        Ok(())
    }

    fn move_next(&mut self) -> StorageResult<bool> {
        let target = self.next.map_or(0, |i| i + 1);
        self.storage.moves.fetch_add(1, Ordering::SeqCst);
        if !self.storage.step_delay.is_zero() {
            thread::sleep(self.storage.step_delay);
        }
        if self.storage.fail_at == Some(target) {
            return Err(StorageError::read_failed(
                "failed to read record header",
                io::Error::new(io::ErrorKind::Other, "disk gone"),
            ));
        }
        self.next = Some(target);
        Ok(target < self.storage.records.len())
    }

    fn column_size(&mut self, column: Column) -> StorageResult<Option<u64>> {
        let (_, data, metadata) = self.current()?;
        match column {
            Column::Data => Ok(*data),
            Column::Metadata => Ok(*metadata),
            Column::Key => Err(StorageError::cursor_misuse("key size not tracked")),
        }
    }

    fn column_as_string(&mut self, column: Column) -> StorageResult<String> {
        assert_eq!(column, Column::Key);
        self.storage.key_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.current()?.0.clone())
    }
}

// =============================================================================
// Test Utilities
// =============================================================================

fn query(value: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    params.insert(MIN_SIZE_PARAM.to_string(), value.to_string());
    params
}

fn responder(storage: Arc<FakeStorage>) -> DocumentSizeResponder {
    DocumentSizeResponder::new(storage, Arc::new(MetricsRegistry::new()))
}

/// Accepts `limit` bytes, then reports a closed pipe.
struct ClosingWriter {
    written: Vec<u8>,
    limit: usize,
}

impl Write for ClosingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written.len() + buf.len() > self.limit {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Records, at every flush, how many read batches had been opened so far.
struct ProbeWriter {
    storage: Arc<FakeStorage>,
    flushes: Arc<Mutex<Vec<(Vec<u8>, usize)>>>,
    pending: Vec<u8>,
}

impl Write for ProbeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let opened = self.storage.batches_opened.load(Ordering::SeqCst);
        let chunk = std::mem::take(&mut self.pending);
        self.flushes.lock().unwrap().push((chunk, opened));
        Ok(())
    }
}

// =============================================================================
// Validation Never Touches Storage
// =============================================================================

#[test]
fn test_invalid_request_never_opens_storage() {
    let storage = Arc::new(FakeStorage::with_sizes(&[5000, 6000]));
    let mut out = Vec::new();
    let err = responder(Arc::clone(&storage))
        .respond(&HashMap::new(), &mut out)
        .unwrap_err();

    assert!(matches!(err, ReportError::InvalidRequest { .. }));
    assert_eq!(out, INVALID_REQUEST_MESSAGE.as_bytes());
    assert_eq!(storage.batches_opened.load(Ordering::SeqCst), 0);
    assert_eq!(storage.moves.load(Ordering::SeqCst), 0);
}

#[test]
fn test_header_flushed_before_transaction_opens() {
    let storage = Arc::new(FakeStorage::with_sizes(&[5000]));
    let flushes = Arc::new(Mutex::new(Vec::new()));
    let writer = ProbeWriter {
        storage: Arc::clone(&storage),
        flushes: Arc::clone(&flushes),
        pending: Vec::new(),
    };

    responder(Arc::clone(&storage)).respond(&query("1"), writer).unwrap();

    let flushes = flushes.lock().unwrap();
    assert_eq!(flushes[0].0, br#"{"DocumentsAndSizes":["#);
    assert_eq!(flushes[0].1, 0);
    // One flush for the entry on its own
    assert_eq!(flushes[1].0, br#"{"Id":"r0","Size":5000}"#);
}

#[test]
fn test_key_read_only_for_reported_records() {
    let storage = Arc::new(FakeStorage::with_sizes(&[100, 5000, 200, 7000, 300]));
    let summary = responder(Arc::clone(&storage))
        .respond(&query("1"), Vec::new())
        .unwrap();

    assert_eq!(summary.records_visited, 5);
    assert_eq!(summary.entries_reported, 2);
    assert_eq!(storage.key_reads.load(Ordering::SeqCst), 2);
    assert_eq!(storage.batches_open.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Heartbeats
// =============================================================================

#[test]
fn test_slow_scan_emits_whitespace_heartbeats() {
    let storage = Arc::new(FakeStorage {
        step_delay: Duration::from_millis(30),
        ..FakeStorage::with_sizes(&[10, 10, 10, 10, 10, 10])
    });
    let responder = responder(Arc::clone(&storage)).with_heartbeat_interval(Duration::from_millis(50));

    let mut out = Vec::new();
    let summary = responder.respond(&query("1"), &mut out).unwrap();
    let body = String::from_utf8(out).unwrap();

    assert!(summary.heartbeats_sent >= 1);
    assert_eq!(body.matches(' ').count() as u64, summary.heartbeats_sent);
    assert_eq!(body.replace(' ', ""), r#"{"DocumentsAndSizes":[]}"#);

    // Still one valid document
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(parsed["DocumentsAndSizes"].as_array().unwrap().is_empty());
}

#[test]
fn test_fast_scan_has_no_heartbeat() {
    let storage = Arc::new(FakeStorage::with_sizes(&[5000; 50]));
    let mut out = Vec::new();
    let summary = responder(storage).respond(&query("1"), &mut out).unwrap();
    assert_eq!(summary.heartbeats_sent, 0);
    assert!(!out.contains(&b' '));
}

#[test]
fn test_heartbeats_between_entries_keep_json_valid() {
    let storage = Arc::new(FakeStorage {
        step_delay: Duration::from_millis(25),
        ..FakeStorage::with_sizes(&[5000, 10, 6000, 10, 7000])
    });
    let responder = responder(Arc::clone(&storage)).with_heartbeat_interval(Duration::from_millis(20));

    let mut out = Vec::new();
    let summary = responder.respond(&query("1"), &mut out).unwrap();
    assert!(summary.heartbeats_sent >= 1);

    let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let ids: Vec<&str> = parsed["DocumentsAndSizes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["Id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["r0", "r2", "r4"]);
}

// =============================================================================
// Failures After Streaming Started
// =============================================================================

#[test]
fn test_mid_scan_failure_keeps_partial_output_and_appends_text() {
    let storage = Arc::new(FakeStorage {
        fail_at: Some(3),
        ..FakeStorage::with_sizes(&[5000, 5001, 5002, 5003, 5004])
    });
    let metrics = Arc::new(MetricsRegistry::new());
    let responder = DocumentSizeResponder::new(Arc::clone(&storage) as Arc<dyn DocumentStorage>, Arc::clone(&metrics));

    let mut out = Vec::new();
    let err = responder.respond(&query("1"), &mut out).unwrap_err();
    assert!(err.is_scan_failure());

    let body = String::from_utf8(out).unwrap();
    let expected_prefix = concat!(
        r#"{"DocumentsAndSizes":["#,
        r#"{"Id":"r0","Size":5000},{"Id":"r1","Size":5001},{"Id":"r2","Size":5002}"#
    );
    assert!(body.starts_with(expected_prefix), "body: {}", body);
    assert_eq!(&body[expected_prefix.len()..], err.to_string());
    assert!(serde_json::from_str::<serde_json::Value>(&body).is_err());

    assert_eq!(storage.batches_open.load(Ordering::SeqCst), 0);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.scans_started, 1);
    assert_eq!(snapshot.scans_failed, 1);
    assert_eq!(snapshot.entries_reported, 3);
}

#[test]
fn test_disconnect_stops_scan_and_releases_transaction() {
    let storage = Arc::new(FakeStorage::with_sizes(&[5000; 1000]));
    // Header plus a handful of entries
    let writer = ClosingWriter {
        written: Vec::new(),
        limit: 200,
    };

    let err = responder(Arc::clone(&storage)).respond(&query("1"), writer).unwrap_err();
    match err {
        ReportError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected error {:?}", other),
    }

    assert_eq!(storage.batches_opened.load(Ordering::SeqCst), 1);
    assert_eq!(storage.batches_open.load(Ordering::SeqCst), 0);
    assert!(storage.moves.load(Ordering::SeqCst) < 1000);
}

#[test]
fn test_scan_runs_on_worker_thread() {
    let storage = Arc::new(FakeStorage::with_sizes(&[5000, 10]));
    let responder = responder(Arc::clone(&storage));
    let scan = responder.prepare(&query("1")).ok().unwrap();

    let handle = thread::spawn(move || {
        let mut out = Vec::new();
        scan.stream(&mut out).unwrap();
        out
    });
    let out = handle.join().unwrap();
    assert_eq!(out, br#"{"DocumentsAndSizes":[{"Id":"r0","Size":5000}]}"#);
}
