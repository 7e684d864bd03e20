//! Document table record format
//!
//! Every version of a document is one append-only record:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, includes itself and the checksum)
//! +------------------+
//! | Etag             | (u64 LE, monotonic per table)
//! +------------------+
//! | Key              | (length-prefixed UTF-8)
//! +------------------+
//! | Tombstone Flag   | (u8: 0 = live, 1 = deleted)
//! +------------------+
//! | data column      | (u8 present flag, u32 LE length, bytes)
//! +------------------+
//! | metadata column  | (u8 present flag, u32 LE length, bytes)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of everything above)
//! +------------------+
//! ```
//!
//! Column lengths sit in front of their values so a reader can learn a
//! column's size and seek past the value without loading it.

use std::io::{self, Read, Seek, SeekFrom};

use crc32fast::Hasher;

use super::errors::{StorageError, StorageResult};

/// Smallest possible record: length + etag + empty key + tombstone +
/// two absent columns + checksum.
pub const MIN_RECORD_SIZE: usize = 4 + 8 + 4 + 1 + (1 + 4) + (1 + 4) + 4;

/// Largest record the `u32` length prefix can describe.
pub const MAX_RECORD_SIZE: u64 = u32::MAX as u64;

/// Rejects a record whose serialized form would not fit the `u32` length
/// fields. Column lengths are bounded by the total, so one check covers all.
pub fn check_record_size(
    key_len: usize,
    data_len: Option<usize>,
    metadata_len: Option<usize>,
) -> StorageResult<()> {
    let total = [key_len, data_len.unwrap_or(0), metadata_len.unwrap_or(0)]
        .iter()
        .fold(MIN_RECORD_SIZE as u64, |sum, len| sum.saturating_add(*len as u64));

    if total > MAX_RECORD_SIZE {
        return Err(StorageError::record_too_large(format!(
            "Record of {} bytes exceeds the {} byte limit",
            total, MAX_RECORD_SIZE
        )));
    }
    Ok(())
}

/// CRC32 (IEEE) over the given bytes.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// A full record as stored in the table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    /// Table-wide sequence assigned at write time
    pub etag: u64,
    /// Document primary key
    pub key: String,
    /// Whether this record deletes the key
    pub is_tombstone: bool,
    /// Document body column
    pub data: Option<Vec<u8>>,
    /// Document metadata column
    pub metadata: Option<Vec<u8>>,
}

impl TableRecord {
    /// A live document version
    pub fn document(
        etag: u64,
        key: impl Into<String>,
        data: Option<Vec<u8>>,
        metadata: Option<Vec<u8>>,
    ) -> Self {
        Self {
            etag,
            key: key.into(),
            is_tombstone: false,
            data,
            metadata,
        }
    }

    /// A delete marker for `key`
    pub fn tombstone(etag: u64, key: impl Into<String>) -> Self {
        Self {
            etag,
            key: key.into(),
            is_tombstone: true,
            data: None,
            metadata: None,
        }
    }

    fn write_column(buf: &mut Vec<u8>, column: &Option<Vec<u8>>) {
        match column {
            Some(value) => {
                buf.push(1);
                buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
                buf.extend_from_slice(value);
            }
            None => {
                buf.push(0);
                buf.extend_from_slice(&0u32.to_le_bytes());
            }
        }
    }

    /// Serialize the complete record, checksum included.
    ///
    /// Lengths are written as `u32`; callers reject larger records with
    /// [`check_record_size`] first.
    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(
            MIN_RECORD_SIZE
                + self.key.len()
                + self.data.as_ref().map_or(0, Vec::len)
                + self.metadata.as_ref().map_or(0, Vec::len),
        );

        body.extend_from_slice(&self.etag.to_le_bytes());
        body.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        body.extend_from_slice(self.key.as_bytes());
        body.push(u8::from(self.is_tombstone));
        Self::write_column(&mut body, &self.data);
        Self::write_column(&mut body, &self.metadata);

        let record_length = (4 + body.len() + 4) as u32;

        let mut record = Vec::with_capacity(record_length as usize);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.extend_from_slice(&body);
        let checksum = compute_checksum(&record);
        record.extend_from_slice(&checksum.to_le_bytes());

        record
    }

    /// Deserialize a record, verifying its checksum.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Record too short",
            ));
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if record_length < MIN_RECORD_SIZE {
            return Err(invalid(format!("Invalid record length: {}", record_length)));
        }

        if data.len() < record_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Record truncated: expected {} bytes, got {}",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = record_length - 4;
        let mut stored = [0u8; 4];
        stored.copy_from_slice(&data[checksum_offset..record_length]);
        let stored_checksum = u32::from_le_bytes(stored);
        let computed_checksum = compute_checksum(&data[..checksum_offset]);

        if computed_checksum != stored_checksum {
            return Err(invalid(format!(
                "Checksum mismatch: computed {:08x}, stored {:08x}",
                computed_checksum, stored_checksum
            )));
        }

        let mut cursor = io::Cursor::new(&data[4..checksum_offset]);
        let etag = read_u64(&mut cursor)?;
        let key = read_key(&mut cursor)?;
        let is_tombstone = read_u8(&mut cursor)? != 0;
        let data_column = read_column(&mut cursor)?;
        let metadata_column = read_column(&mut cursor)?;

        if cursor.position() as usize != checksum_offset - 4 {
            return Err(invalid("Trailing bytes before checksum"));
        }

        Ok((
            Self {
                etag,
                key,
                is_tombstone,
                data: data_column,
                metadata: metadata_column,
            },
            record_length,
        ))
    }
}

/// The leading part of a record: everything except column values.
///
/// Produced by [`RecordHeader::read_from`], which seeks past both column
/// values instead of reading them. The checksum is not verified here; the
/// table verifies every record once when it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Total record length on disk
    pub record_length: u32,
    /// Etag stored in the record
    pub etag: u64,
    /// Document primary key
    pub key: String,
    /// Whether the record is a delete marker
    pub is_tombstone: bool,
    /// Stored length of the data column, `None` when absent
    pub data_len: Option<u32>,
    /// Stored length of the metadata column, `None` when absent
    pub metadata_len: Option<u32>,
}

impl RecordHeader {
    /// Read a header starting at the reader's current position.
    ///
    /// Leaves the reader positioned on the record's checksum.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> io::Result<Self> {
        let record_length = read_u32(reader)?;
        if (record_length as usize) < MIN_RECORD_SIZE {
            return Err(invalid(format!("Invalid record length: {}", record_length)));
        }

        let etag = read_u64(reader)?;
        let key = read_key(reader)?;
        let is_tombstone = read_u8(reader)? != 0;
        let data_len = skip_column(reader)?;
        let metadata_len = skip_column(reader)?;

        Ok(Self {
            record_length,
            etag,
            key,
            is_tombstone,
            data_len,
            metadata_len,
        })
    }
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_key<R: Read>(reader: &mut R) -> io::Result<String> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| invalid(format!("Invalid UTF-8 key: {}", e)))
}

fn read_column<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let present = read_u8(reader)? != 0;
    let len = read_u32(reader)? as usize;
    if !present {
        if len != 0 {
            return Err(invalid("Absent column with non-zero length"));
        }
        return Ok(None);
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(Some(buf))
}

fn skip_column<R: Read + Seek>(reader: &mut R) -> io::Result<Option<u32>> {
    let present = read_u8(reader)? != 0;
    let len = read_u32(reader)?;
    if !present {
        return Ok(None);
    }
    reader.seek(SeekFrom::Current(i64::from(len)))?;
    Ok(Some(len))
}
