//! File-backed documents table (`esent` engine)
//!
//! Layout: `<data_dir>/data/documents.tbl`, append-only, one
//! [`TableRecord`] per document version.
//!
//! On open the whole file is read once with checksum verification to build
//! two in-memory indexes:
//!
//! - `by_key`: key -> etag of its latest live version
//! - `by_etag`: etag -> byte offset, live versions only
//!
//! Writers hold the table lock exclusively. A [`TableBatch`] takes the lock
//! only long enough to share the current `by_etag` map, so an open scan never
//! blocks writers. Records never move once written, which keeps every offset
//! in that snapshot valid for the life of the batch.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::cursor::TableCursor;
use super::engine::{
    DiagnosticCursor, DocumentStorage, OrderedScanStorage, ReadBatch, StorageEngineKind,
    StoredDocument,
};
use super::errors::{StorageError, StorageResult};
use super::reader::TableReader;
use super::record::{check_record_size, TableRecord};

/// Table file name inside `<data_dir>/data`
pub const TABLE_FILE_NAME: &str = "documents.tbl";

/// Index state shared by writers and read batches.
///
/// `by_etag` is copy-on-write: a batch holding the previous map keeps it
/// unchanged while the writer mutates its own copy.
struct TableIndex {
    by_etag: Arc<BTreeMap<u64, u64>>,
    by_key: HashMap<String, u64>,
    next_etag: u64,
}

impl TableIndex {
    fn empty() -> Self {
        Self {
            by_etag: Arc::new(BTreeMap::new()),
            by_key: HashMap::new(),
            next_etag: 1,
        }
    }

    /// Apply one record found at `offset`. Later records win.
    fn apply(&mut self, record: &TableRecord, offset: u64) {
        let by_etag = Arc::make_mut(&mut self.by_etag);
        if let Some(previous) = self.by_key.remove(&record.key) {
            by_etag.remove(&previous);
        }
        if !record.is_tombstone {
            self.by_key.insert(record.key.clone(), record.etag);
            by_etag.insert(record.etag, offset);
        }
        self.next_etag = self.next_etag.max(record.etag + 1);
    }
}

struct TableState {
    file: File,
    end_offset: u64,
    index: TableIndex,
}

/// The documents table.
pub struct DocumentTable {
    path: PathBuf,
    state: RwLock<TableState>,
}

impl DocumentTable {
    /// Opens or creates the table under `data_dir`.
    ///
    /// Creates `<data_dir>/data/documents.tbl` if it does not exist.
    ///
    /// # Errors
    ///
    /// `AERO_DATA_CORRUPTION` if any existing record fails verification.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        let data_subdir = data_dir.join("data");
        fs::create_dir_all(&data_subdir).map_err(|e| {
            StorageError::write_failed(
                format!("Failed to create data directory: {}", data_subdir.display()),
                e,
            )
        })?;

        let path = data_subdir.join(TABLE_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                StorageError::write_failed(
                    format!("Failed to open table file: {}", path.display()),
                    e,
                )
            })?;

        let (index, end_offset) = Self::rebuild_index(&path)?;

        Ok(Self {
            path,
            state: RwLock::new(TableState {
                file,
                end_offset,
                index,
            }),
        })
    }

    fn rebuild_index(path: &Path) -> StorageResult<(TableIndex, u64)> {
        let mut index = TableIndex::empty();
        let mut reader = TableReader::open(path)?;

        loop {
            let offset = reader.current_offset();
            match reader.read_next()? {
                Some(record) => index.apply(&record, offset),
                None => return Ok((index, offset)),
            }
        }
    }

    /// Returns the table file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(&self) -> StorageResult<RwLockReadGuard<'_, TableState>> {
        self.state
            .read()
            .map_err(|_| StorageError::lock_poisoned("Table lock poisoned by a panicked writer"))
    }

    fn write_state(&self) -> StorageResult<RwLockWriteGuard<'_, TableState>> {
        self.state
            .write()
            .map_err(|_| StorageError::lock_poisoned("Table lock poisoned by a panicked writer"))
    }

    fn append(&self, state: &mut TableState, record: &TableRecord) -> StorageResult<u64> {
        let bytes = record.serialize();
        let offset = state.end_offset;

        let written = state
            .file
            .write_all(&bytes)
            .map_err(|e| {
                StorageError::write_failed(format!("Failed to write document: {}", record.key), e)
            })
            .and_then(|()| {
                state.file.sync_all().map_err(|e| {
                    StorageError::write_failed(
                        format!("fsync failed after writing document: {}", record.key),
                        e,
                    )
                })
            });
        if let Err(err) = written {
            Self::discard_tail(state, offset);
            return Err(err);
        }

        state.end_offset += bytes.len() as u64;
        state.index.apply(record, offset);
        Ok(offset)
    }

    /// Cuts the file back to `offset` after a failed append.
    ///
    /// A partial record left behind would fail verification on the next open,
    /// and `end_offset` must keep matching the real end of the file. If the
    /// truncate itself fails, `end_offset` follows whatever length the file
    /// now reports.
    fn discard_tail(state: &mut TableState, offset: u64) {
        state.end_offset = match state.file.set_len(offset) {
            Ok(()) => offset,
            Err(_) => state
                .file
                .metadata()
                .map(|meta| meta.len())
                .unwrap_or(offset),
        };
    }
}

impl DocumentStorage for DocumentTable {
    fn engine(&self) -> StorageEngineKind {
        StorageEngineKind::Esent
    }

    fn put(&self, key: &str, data: Option<&[u8]>, metadata: Option<&[u8]>) -> StorageResult<u64> {
        check_record_size(key.len(), data.map(<[u8]>::len), metadata.map(<[u8]>::len))?;
        let mut state = self.write_state()?;
        let etag = state.index.next_etag;
        let record = TableRecord::document(
            etag,
            key,
            data.map(<[u8]>::to_vec),
            metadata.map(<[u8]>::to_vec),
        );
        self.append(&mut state, &record)?;
        Ok(etag)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut state = self.write_state()?;
        if !state.index.by_key.contains_key(key) {
            return Ok(false);
        }
        let etag = state.index.next_etag;
        self.append(&mut state, &TableRecord::tombstone(etag, key))?;
        Ok(true)
    }

    fn get(&self, key: &str) -> StorageResult<Option<StoredDocument>> {
        let state = self.read_state()?;
        let offset = match state
            .index
            .by_key
            .get(key)
            .and_then(|etag| state.index.by_etag.get(etag))
        {
            Some(offset) => *offset,
            None => return Ok(None),
        };

        let record = TableReader::open(&self.path)?.read_at(offset)?;
        Ok(Some(StoredDocument {
            key: record.key,
            etag: record.etag,
            data: record.data,
            metadata: record.metadata,
        }))
    }

    fn document_count(&self) -> usize {
        self.read_state()
            .map(|state| state.index.by_key.len())
            .unwrap_or(0)
    }

    fn as_ordered_scan(&self) -> Option<&dyn OrderedScanStorage> {
        Some(self)
    }
}

impl OrderedScanStorage for DocumentTable {
    fn begin_read(&self) -> StorageResult<Box<dyn ReadBatch + '_>> {
        let by_etag = Arc::clone(&self.read_state()?.index.by_etag);
        let session = File::open(&self.path).map_err(|e| {
            StorageError::read_failed(
                format!("Failed to open read session on {}", self.path.display()),
                e,
            )
        })?;

        Ok(Box::new(TableBatch {
            by_etag,
            session: BufReader::new(session),
        }))
    }
}

/// A read transaction: a snapshot of `by_etag` plus a private file handle.
///
/// The batch holds no lock. Writes made after it began are not visible to it.
pub struct TableBatch {
    by_etag: Arc<BTreeMap<u64, u64>>,
    session: BufReader<File>,
}

impl ReadBatch for TableBatch {
    fn documents(&mut self) -> StorageResult<Box<dyn DiagnosticCursor + '_>> {
        Ok(Box::new(TableCursor::new(&self.by_etag, &mut self.session)))
    }
}
