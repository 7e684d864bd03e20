//! Document storage for aerodb-docstats
//!
//! Two engines implement [`DocumentStorage`]:
//!
//! - [`DocumentTable`] (`esent`): append-only, checksummed table file with a
//!   `by_etag` index. Grants [`OrderedScanStorage`].
//! - [`MemoryStorage`] (`memory`): a map, no ordered scan.
//!
//! # Invariants Enforced
//!
//! - Checksums on every record, verified when the table is opened
//! - Halt on corruption: a table that fails verification does not open
//! - Etags are strictly increasing and never reused
//! - A read batch scans a snapshot; writes never wait for it

mod cursor;
mod engine;
mod errors;
mod memory;
mod reader;
mod record;
mod table;

pub use cursor::TableCursor;
pub use engine::{
    Column, DiagnosticCursor, DocumentStorage, OrderedScanStorage, ReadBatch, StorageEngineKind,
    StoredDocument, BY_ETAG_INDEX,
};
pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use memory::MemoryStorage;
pub use reader::TableReader;
pub use record::{
    check_record_size, compute_checksum, RecordHeader, TableRecord, MAX_RECORD_SIZE, MIN_RECORD_SIZE,
};
pub use table::{DocumentTable, TableBatch, TABLE_FILE_NAME};
