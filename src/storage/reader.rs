//! Sequential table reader with checksum verification
//!
//! Used to rebuild the table's indexes on open and for point lookups.
//! Any checksum failure is fatal.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::record::{TableRecord, MIN_RECORD_SIZE};

/// Reads verified records from a table file.
pub struct TableReader {
    path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl TableReader {
    /// Opens the table file for reading.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path).map_err(|e| {
            StorageError::read_failed(format!("Failed to open table file: {}", path.display()), e)
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| StorageError::read_failed("Failed to read table metadata", e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    /// Returns the table file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the offset of the next record.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Reads the next record.
    ///
    /// - `Ok(Some(record))` if a record was read
    /// - `Ok(None)` at end of file
    /// - `Err(AERO_DATA_CORRUPTION)` on truncation or checksum failure
    pub fn read_next(&mut self) -> StorageResult<Option<TableRecord>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < MIN_RECORD_SIZE as u64 {
            return Err(StorageError::corruption_at_offset(
                self.current_offset,
                format!(
                    "Truncated table: {} bytes remaining, minimum record size is {}",
                    remaining, MIN_RECORD_SIZE
                ),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            StorageError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read record length: {}", e),
            )
        })?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < MIN_RECORD_SIZE as u64 || record_length > remaining {
            return Err(StorageError::corruption_at_offset(
                self.current_offset,
                format!(
                    "Invalid record length {} ({} bytes remaining)",
                    record_length, remaining
                ),
            ));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut record_buf[4..]).map_err(|e| {
            StorageError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read record body: {}", e),
            )
        })?;

        let (record, consumed) = TableRecord::deserialize(&record_buf)
            .map_err(|e| StorageError::corruption_at_offset(self.current_offset, e.to_string()))?;

        self.current_offset += consumed as u64;
        Ok(Some(record))
    }

    /// Reads the record stored at `offset`.
    pub fn read_at(&mut self, offset: u64) -> StorageResult<TableRecord> {
        self.reader.seek(SeekFrom::Start(offset)).map_err(|e| {
            StorageError::read_failed(format!("Failed to seek to offset {}", offset), e)
        })?;
        self.current_offset = offset;

        self.read_next()?.ok_or_else(|| {
            StorageError::corruption_at_offset(offset, "No record at specified offset")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_records(dir: &TempDir, records: &[TableRecord]) -> PathBuf {
        let path = dir.path().join("documents.tbl");
        let mut file = File::create(&path).unwrap();
        for record in records {
            file.write_all(&record.serialize()).unwrap();
        }
        path
    }

    #[test]
    fn test_read_sequence_then_eof() {
        let dir = TempDir::new().unwrap();
        let path = write_records(
            &dir,
            &[
                TableRecord::document(1, "a", Some(b"x".to_vec()), None),
                TableRecord::tombstone(2, "a"),
            ],
        );

        let mut reader = TableReader::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap().unwrap().key, "a");
        assert!(reader.read_next().unwrap().unwrap().is_tombstone);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_read_at_second_record() {
        let dir = TempDir::new().unwrap();
        let first = TableRecord::document(1, "first", None, None);
        let offset = first.serialize().len() as u64;
        let path = write_records(
            &dir,
            &[first, TableRecord::document(2, "second", None, Some(b"m".to_vec()))],
        );

        let mut reader = TableReader::open(&path).unwrap();
        let record = reader.read_at(offset).unwrap();
        assert_eq!(record.key, "second");
        assert_eq!(record.etag, 2);
    }

    #[test]
    fn test_truncated_tail_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = write_records(&dir, &[TableRecord::document(1, "a", None, None)]);
        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0x01, 0x02, 0x03]).unwrap();
        }

        let mut reader = TableReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        let err = reader.read_next().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.details(), Some("byte_offset: 32"));
    }
}
