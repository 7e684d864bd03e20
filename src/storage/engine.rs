//! Storage engine seams
//!
//! [`DocumentStorage`] is what every backend implements. Backends that can
//! walk their documents in table order additionally grant the
//! [`OrderedScanStorage`] capability through
//! [`DocumentStorage::as_ordered_scan`]; diagnostics ask for the capability
//! instead of matching on the concrete backend type.
//!
//! The scan protocol mirrors a table cursor:
//!
//! ```text
//! begin_read()           -> ReadBatch      (index snapshot + session)
//!   documents()          -> DiagnosticCursor
//!     set_current_index("by_etag")
//!     move_before_first()
//!     while move_next()? { column_size(..)? / column_as_string(..)? }
//! drop(cursor); drop(batch)                (snapshot and session released)
//! ```

use std::fmt;
use std::str::FromStr;

use super::errors::StorageResult;

/// Name of the index ordering documents by etag.
pub const BY_ETAG_INDEX: &str = "by_etag";

/// Columns of the documents table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Primary key
    Key,
    /// Document body
    Data,
    /// Document metadata
    Metadata,
}

impl Column {
    /// Column name as stored in the table definition
    pub fn name(&self) -> &'static str {
        match self {
            Column::Key => "key",
            Column::Data => "data",
            Column::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Available storage engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageEngineKind {
    /// File-backed document table with a `by_etag` index
    Esent,
    /// Process-local map, nothing persisted
    Memory,
}

impl StorageEngineKind {
    /// Configuration name of the engine
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageEngineKind::Esent => "esent",
            StorageEngineKind::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "esent" => Ok(StorageEngineKind::Esent),
            "memory" => Ok(StorageEngineKind::Memory),
            other => Err(format!(
                "Unknown storage engine '{}'. Must be 'esent' or 'memory'.",
                other
            )),
        }
    }
}

/// A live document as returned by point lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub key: String,
    pub etag: u64,
    pub data: Option<Vec<u8>>,
    pub metadata: Option<Vec<u8>>,
}

/// A document store.
pub trait DocumentStorage: Send + Sync {
    /// Which engine backs this store
    fn engine(&self) -> StorageEngineKind;

    /// Insert or replace `key`; returns the etag assigned to the new version.
    fn put(&self, key: &str, data: Option<&[u8]>, metadata: Option<&[u8]>) -> StorageResult<u64>;

    /// Delete `key`; returns whether a live document was removed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Latest live version of `key`
    fn get(&self, key: &str) -> StorageResult<Option<StoredDocument>>;

    /// Number of live documents
    fn document_count(&self) -> usize;

    /// The ordered diagnostic scan capability, if this engine grants it.
    fn as_ordered_scan(&self) -> Option<&dyn OrderedScanStorage> {
        None
    }
}

/// Storage that can hand out read transactions over its documents table.
pub trait OrderedScanStorage: Send + Sync {
    /// Open a read transaction.
    ///
    /// The returned batch holds the engine's read resources until dropped.
    fn begin_read(&self) -> StorageResult<Box<dyn ReadBatch + '_>>;
}

/// One read transaction.
pub trait ReadBatch {
    /// Open a cursor on the documents table, valid for the batch's lifetime.
    fn documents(&mut self) -> StorageResult<Box<dyn DiagnosticCursor + '_>>;
}

/// Forward-only, read-only cursor over the documents table.
///
/// Column accessors refer to the record the cursor is positioned on and fail
/// with `AERO_STORAGE_CURSOR_MISUSE` when it is not positioned on one.
pub trait DiagnosticCursor {
    /// Select the index that defines iteration order.
    fn set_current_index(&mut self, index: &str) -> StorageResult<()>;

    /// Position before the first entry of the current index.
    fn move_before_first(&mut self) -> StorageResult<()>;

    /// Advance one record. `false` means the end of the index was reached.
    fn move_next(&mut self) -> StorageResult<bool>;

    /// Stored length of a column, `None` when the column holds no value.
    /// Never reads the value itself.
    fn column_size(&mut self, column: Column) -> StorageResult<Option<u64>>;

    /// Column value decoded as UTF-8 text.
    fn column_as_string(&mut self, column: Column) -> StorageResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("esent".parse::<StorageEngineKind>(), Ok(StorageEngineKind::Esent));
        assert_eq!("memory".parse::<StorageEngineKind>(), Ok(StorageEngineKind::Memory));
        assert!("munin".parse::<StorageEngineKind>().is_err());
    }

    #[test]
    fn test_column_names() {
        assert_eq!(Column::Key.name(), "key");
        assert_eq!(Column::Data.to_string(), "data");
        assert_eq!(Column::Metadata.name(), "metadata");
    }
}
