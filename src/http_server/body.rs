//! Blocking writer feeding a streaming response body
//!
//! A scan runs on the blocking pool and writes through [`ChannelWriter`];
//! every write becomes one body chunk. When the client goes away the body
//! is dropped, the channel closes and the next write fails with
//! `BrokenPipe`, which ends the scan and releases its read transaction.

use std::io::{self, Write};

use axum::body::{Body, Bytes};
use futures_util::stream;
use tokio::sync::mpsc;

/// `io::Write` end of a streaming body. Must be used off the async runtime.
pub struct ChannelWriter {
    tx: mpsc::Sender<Bytes>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Bytes::copy_from_slice(buf))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped by client"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.tx.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped by client"));
        }
        Ok(())
    }
}

/// Create a writer and the body it feeds. `capacity` bounds how many chunks
/// may wait for the socket before the writer blocks.
pub fn channel_body(capacity: usize) -> (ChannelWriter, Body) {
    let (tx, rx) = mpsc::channel::<Bytes>(capacity.max(1));
    let chunks = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, io::Error>(chunk), rx))
    });
    (ChannelWriter { tx }, Body::from_stream(chunks))
}
