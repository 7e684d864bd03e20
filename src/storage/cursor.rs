//! Diagnostic cursor over the documents table

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::ops::Bound;

use super::engine::{Column, DiagnosticCursor, BY_ETAG_INDEX};
use super::errors::{StorageError, StorageResult};
use super::record::RecordHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Unset,
    BeforeFirst,
    On { etag: u64, offset: u64 },
    AfterLast,
}

/// Walks the `by_etag` snapshot of one read batch.
///
/// Only record headers are decoded; column values are skipped with a seek.
/// The header of the current record is cached until the cursor moves.
pub struct TableCursor<'a> {
    by_etag: &'a BTreeMap<u64, u64>,
    session: &'a mut BufReader<File>,
    index_selected: bool,
    position: Position,
    header: Option<RecordHeader>,
}

impl<'a> TableCursor<'a> {
    pub(crate) fn new(by_etag: &'a BTreeMap<u64, u64>, session: &'a mut BufReader<File>) -> Self {
        Self {
            by_etag,
            session,
            index_selected: false,
            position: Position::Unset,
            header: None,
        }
    }

    fn current_header(&mut self) -> StorageResult<&RecordHeader> {
        let (etag, offset) = match self.position {
            Position::On { etag, offset } => (etag, offset),
            Position::Unset | Position::BeforeFirst | Position::AfterLast => {
                return Err(StorageError::cursor_misuse(
                    "Cursor is not positioned on a record",
                ))
            }
        };

        if self.header.is_none() {
            self.session.seek(SeekFrom::Start(offset)).map_err(|e| {
                StorageError::read_failed(format!("Failed to seek to offset {}", offset), e)
            })?;
            let header = RecordHeader::read_from(&mut *self.session).map_err(|e| {
                StorageError::corruption_at_offset(offset, format!("Unreadable record header: {}", e))
            })?;
            if header.etag != etag {
                return Err(StorageError::corruption_at_offset(
                    offset,
                    format!("Index points at etag {} but record holds {}", etag, header.etag),
                ));
            }
            self.header = Some(header);
        }

        self.header
            .as_ref()
            .ok_or_else(|| StorageError::cursor_misuse("Record header unavailable"))
    }
}

impl DiagnosticCursor for TableCursor<'_> {
    fn set_current_index(&mut self, index: &str) -> StorageResult<()> {
        if index != BY_ETAG_INDEX {
            return Err(StorageError::cursor_misuse(format!(
                "Unknown index '{}' on documents table",
                index
            )));
        }
        self.index_selected = true;
        self.position = Position::Unset;
        self.header = None;
        Ok(())
    }

    fn move_before_first(&mut self) -> StorageResult<()> {
        if !self.index_selected {
            return Err(StorageError::cursor_misuse("No current index selected"));
        }
        self.position = Position::BeforeFirst;
        self.header = None;
        Ok(())
    }

    fn move_next(&mut self) -> StorageResult<bool> {
        let next = match self.position {
            Position::Unset => {
                return Err(StorageError::cursor_misuse(
                    "Cursor must be positioned before moving",
                ))
            }
            Position::AfterLast => None,
            Position::BeforeFirst => self.by_etag.iter().next(),
            Position::On { etag, .. } => self
                .by_etag
                .range((Bound::Excluded(etag), Bound::Unbounded))
                .next(),
        };

        self.header = None;
        match next {
            Some((&etag, &offset)) => {
                self.position = Position::On { etag, offset };
                Ok(true)
            }
            None => {
                self.position = Position::AfterLast;
                Ok(false)
            }
        }
    }

    fn column_size(&mut self, column: Column) -> StorageResult<Option<u64>> {
        let header = self.current_header()?;
        Ok(match column {
            Column::Key => Some(header.key.len() as u64),
            Column::Data => header.data_len.map(u64::from),
            Column::Metadata => header.metadata_len.map(u64::from),
        })
    }

    fn column_as_string(&mut self, column: Column) -> StorageResult<String> {
        match column {
            Column::Key => Ok(self.current_header()?.key.clone()),
            other => Err(StorageError::cursor_misuse(format!(
                "Column '{}' is binary and cannot be read as text",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{
        Column, DiagnosticCursor, DocumentStorage, DocumentTable, OrderedScanStorage, ReadBatch,
        BY_ETAG_INDEX,
    };
    use tempfile::TempDir;

    fn table_with(docs: &[(&str, Option<&[u8]>, Option<&[u8]>)]) -> (TempDir, DocumentTable) {
        let dir = TempDir::new().unwrap();
        let table = DocumentTable::open(dir.path()).unwrap();
        for (key, data, metadata) in docs {
            table.put(key, *data, *metadata).unwrap();
        }
        (dir, table)
    }

    #[test]
    fn test_walks_in_etag_order_with_sizes() {
        let (_dir, table) = table_with(&[
            ("c", Some(&[0u8; 10][..]), Some(&b"mm"[..])),
            ("a", None, Some(&b"m"[..])),
            ("b", Some(&b""[..]), None),
        ]);

        let mut batch = table.begin_read().unwrap();
        let mut cursor = batch.documents().unwrap();
        cursor.set_current_index(BY_ETAG_INDEX).unwrap();
        cursor.move_before_first().unwrap();

        let mut seen = Vec::new();
        while cursor.move_next().unwrap() {
            seen.push((
                cursor.column_as_string(Column::Key).unwrap(),
                cursor.column_size(Column::Data).unwrap(),
                cursor.column_size(Column::Metadata).unwrap(),
            ));
        }

        assert_eq!(
            seen,
            vec![
                ("c".to_string(), Some(10), Some(2)),
                ("a".to_string(), None, Some(1)),
                ("b".to_string(), Some(0), None),
            ]
        );
        assert!(!cursor.move_next().unwrap());
    }

    #[test]
    fn test_empty_table_ends_immediately() {
        let (_dir, table) = table_with(&[]);
        let mut batch = table.begin_read().unwrap();
        let mut cursor = batch.documents().unwrap();
        cursor.set_current_index(BY_ETAG_INDEX).unwrap();
        cursor.move_before_first().unwrap();
        assert!(!cursor.move_next().unwrap());
    }

    #[test]
    fn test_protocol_violations_are_rejected() {
        let (_dir, table) = table_with(&[("a", Some(&b"x"[..]), None)]);
        let mut batch = table.begin_read().unwrap();
        let mut cursor = batch.documents().unwrap();

        assert!(cursor.move_before_first().is_err());
        assert!(cursor.set_current_index("by_key").is_err());
        cursor.set_current_index(BY_ETAG_INDEX).unwrap();
        assert!(cursor.move_next().is_err());
        cursor.move_before_first().unwrap();
        assert!(cursor.column_size(Column::Data).is_err());
        assert!(cursor.move_next().unwrap());
        assert!(cursor.column_as_string(Column::Data).is_err());
    }

    fn scan_sizes(batch: &mut (dyn ReadBatch + '_)) -> Vec<(String, Option<u64>)> {
        let mut cursor = batch.documents().unwrap();
        cursor.set_current_index(BY_ETAG_INDEX).unwrap();
        cursor.move_before_first().unwrap();
        let mut seen = Vec::new();
        while cursor.move_next().unwrap() {
            seen.push((
                cursor.column_as_string(Column::Key).unwrap(),
                cursor.column_size(Column::Data).unwrap(),
            ));
        }
        seen
    }

    #[test]
    fn test_writer_proceeds_while_batch_open() {
        use std::sync::{mpsc, Arc};
        use std::time::Duration;

        let (_dir, table) = table_with(&[("a", Some(&b"x"[..]), None)]);
        let table = Arc::new(table);
        let mut batch = table.begin_read().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let writer = {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                let added = table.put("b", Some(&b"y"[..]), None).unwrap();
                let replaced = table.put("a", Some(&b"zz"[..]), None).unwrap();
                done_tx.send((added, replaced)).unwrap();
            })
        };
        let etags = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("writer blocked by an open batch");
        assert_eq!(etags, (2, 3));
        writer.join().unwrap();

        // The open batch still reads the version it started with
        assert_eq!(scan_sizes(&mut *batch), vec![("a".to_string(), Some(1))]);
        drop(batch);

        let mut fresh = table.begin_read().unwrap();
        assert_eq!(
            scan_sizes(&mut *fresh),
            vec![("b".to_string(), Some(1)), ("a".to_string(), Some(2))]
        );
    }
}
