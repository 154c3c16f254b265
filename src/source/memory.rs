//! An in-memory byte source, standing in for a real socket or file in
//! grabber tests — the same role a `Cursor<Vec<u8>>` plays in many
//! async I/O test suites.

use std::time::Duration;

/// Serves a fixed byte buffer, optionally in small chunks to exercise the
/// grabber's straddled-read reassembly, and optionally hanging forever
/// once exhausted to exercise cancellation while blocked in `read`.
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
    pos: usize,
    chunk_size: usize,
    throttle: Option<Duration>,
    pending_after_read: bool,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            pos: 0,
            chunk_size: usize::MAX,
            throttle: None,
            pending_after_read: false,
        }
    }

    /// Cap every `read()` to at most `n` bytes, to force a frame's payload
    /// to straddle multiple reads.
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    pub fn with_throttle(mut self, d: Duration) -> Self {
        self.throttle = Some(d);
        self
    }

    /// After the buffer is exhausted, `read()` never resolves instead of
    /// returning EOF — simulates a live connection sitting idle.
    pub fn pending_after_read(mut self) -> Self {
        self.pending_after_read = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn throttle(&self) -> Option<Duration> {
        self.throttle
    }

    pub async fn open(&mut self) -> Result<(), crate::error::SourceError> {
        Ok(())
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.data.len() {
            if self.pending_after_read {
                std::future::pending::<()>().await;
            }
            return Ok(0);
        }
        let n = buf
            .len()
            .min(self.chunk_size)
            .min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    pub fn close(&mut self) {}
}
