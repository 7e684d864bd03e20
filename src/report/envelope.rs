//! # Response Envelope
//!
//! Incremental writer for
//!
//! ```text
//! {"DocumentsAndSizes":[{"Id":"...","Size":N},...]}
//! ```
//!
//! The opening bytes go out before the scan starts so a client can begin
//! parsing while records are still being visited. Entries are serialized
//! with `serde_json`; the framing around them is written by hand because
//! the array is never held in memory.

use std::io::{self, BufWriter, Write};

use super::size::ReportEntry;

/// Name of the single root property
pub const ENTRIES_PROPERTY: &str = "DocumentsAndSizes";

/// Streaming writer for the report envelope.
pub struct JsonStreamWriter<W: Write> {
    inner: BufWriter<W>,
    entries_written: u64,
}

impl<W: Write> JsonStreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            entries_written: 0,
        }
    }

    /// `{"DocumentsAndSizes":[`, flushed.
    pub fn begin_report(&mut self) -> io::Result<()> {
        self.inner.write_all(b"{")?;
        serde_json::to_writer(&mut self.inner, ENTRIES_PROPERTY).map_err(io::Error::from)?;
        self.inner.write_all(b":[")?;
        self.inner.flush()
    }

    /// One array element. Not flushed.
    pub fn write_entry(&mut self, entry: &ReportEntry) -> io::Result<()> {
        if self.entries_written > 0 {
            self.inner.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.inner, entry).map_err(io::Error::from)?;
        self.entries_written += 1;
        Ok(())
    }

    /// Insignificant whitespace between elements, flushed.
    pub fn write_whitespace(&mut self, byte: u8) -> io::Result<()> {
        debug_assert!(matches!(byte, b' ' | b'\t' | b'\n' | b'\r'));
        self.inner.write_all(&[byte])?;
        self.inner.flush()
    }

    /// `]}`, flushed.
    pub fn finish_report(&mut self) -> io::Result<()> {
        self.inner.write_all(b"]}")?;
        self.inner.flush()
    }

    /// Plain text after whatever was already written, flushed.
    pub fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.inner.write_all(text.as_bytes())?;
        self.inner.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}
