//! Byte sinks the writer encodes into.
//!
//! A sink only has to append bytes, report its length, overwrite a range it already holds
//! (for length fields back-filled after a body is written) and hand its contents over once the
//! archive is finalized. The transport layer that supplies a sink owns any framing around it.

use bytes::{Bytes, BytesMut};

/// Append-only byte buffer with back-patching
pub trait ByteSink {
    /// Append bytes at the end
    fn append(&mut self, bytes: &[u8]);

    /// Number of bytes held
    fn position(&self) -> usize;

    /// Overwrite `bytes.len()` bytes starting at `at`; the range must already be written
    fn patch(&mut self, at: usize, bytes: &[u8]);

    /// Take the contents, leaving the sink empty
    fn take(&mut self) -> Bytes;
}

impl ByteSink for BytesMut {
    fn append(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn position(&self) -> usize {
        self.len()
    }

    fn patch(&mut self, at: usize, bytes: &[u8]) {
        self[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn take(&mut self) -> Bytes {
        self.split().freeze()
    }
}

impl ByteSink for Vec<u8> {
    fn append(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn position(&self) -> usize {
        self.len()
    }

    fn patch(&mut self, at: usize, bytes: &[u8]) {
        self[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn take(&mut self) -> Bytes {
        Bytes::from(std::mem::take(self))
    }
}
