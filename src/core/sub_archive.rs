//! # Sub-Archives
//!
//! A sub-archive is a length-prefixed region (`length: u32`, then `length` bytes). Its children
//! are encoded into a scratch frame and copied into the enclosing level when the frame closes,
//! once the length is known.
//!
//! Frames share the parent writer's identity table and registry. An object first written inside
//! a sub-archive and referenced after it (or the other way round) keeps one identity, and its
//! reference-table row holds an absolute buffer offset because each frame knows the absolute
//! position it will land at.
//!
//! ```rust
//! use graph_archive::{ArchiveReader, ArchiveWriter, TypeRegistry};
//!
//! let registry = TypeRegistry::new().into_shared();
//! let mut writer = ArchiveWriter::new(registry.clone());
//! {
//!     let mut section = writer.open_sub_archive()?;
//!     section.write_u32(7)?;
//!     section.write_str("skipped")?;
//!     section.close()?;
//! }
//! writer.write_u8(1)?;
//! let bytes = writer.finalize()?;
//!
//! let mut reader = ArchiveReader::open(bytes, registry)?;
//! reader.skip_sub_archive()?;
//! assert_eq!(reader.read_u8()?, 1);
//! # Ok::<(), graph_archive::ArchiveError>(())
//! ```

use crate::core::writer::ArchiveWriter;
use crate::error::{ArchiveError, Result};
use crate::utils::metrics::global_metrics;
use std::ops::{Deref, DerefMut};
use tracing::{trace, warn};

/// Scratch buffer for one open sub-archive
#[derive(Debug)]
pub(crate) struct ScratchFrame {
    /// Absolute position of the first content byte once the frame is copied out
    base: usize,
    buf: Vec<u8>,
}

impl ScratchFrame {
    fn new(base: usize) -> Self {
        Self {
            base,
            buf: Vec::new(),
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.base + self.buf.len()
    }

    pub(crate) fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `at` is absolute; `None` unless it falls inside this frame
    pub(crate) fn patch(&mut self, at: usize, bytes: &[u8]) -> Option<()> {
        let start = at.checked_sub(self.base)?;
        self.buf
            .get_mut(start..start + bytes.len())?
            .copy_from_slice(bytes);
        Some(())
    }
}

impl ArchiveWriter {
    /// Open a sub-archive; every write until the matching `end_sub_archive` lands inside it
    pub fn begin_sub_archive(&mut self) -> Result<()> {
        if self.is_finalized() {
            return Err(ArchiveError::FinalizedWriterReuse);
        }
        let base = self.position() + 4;
        self.frames.push(ScratchFrame::new(base));
        trace!(base, depth = self.frames.len(), "Opened sub-archive");
        Ok(())
    }

    /// Close the innermost sub-archive and write `(length, bytes)` into the level below
    pub fn end_sub_archive(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or(ArchiveError::UnbalancedSubArchive {
                open: 0,
                expected: 1,
            })?;
        let len = self.wire_len(frame.buf.len())?;
        self.write_u32(len)?;
        self.put(&frame.buf)?;
        global_metrics().sub_archive_written();
        trace!(base = frame.base, len, "Closed sub-archive");
        Ok(())
    }

    /// Run `body` inside a sub-archive, closing it afterwards
    pub fn sub_archive<R, F>(&mut self, body: F) -> Result<R>
    where
        F: FnOnce(&mut ArchiveWriter) -> Result<R>,
    {
        self.begin_sub_archive()?;
        let out = body(self)?;
        self.end_sub_archive()?;
        Ok(out)
    }

    /// Open a sub-archive behind a guard that closes it on `close()` or drop
    pub fn open_sub_archive(&mut self) -> Result<SubArchiveWriter<'_>> {
        self.begin_sub_archive()?;
        let level = self.frames.len();
        Ok(SubArchiveWriter {
            writer: self,
            level,
            closed: false,
        })
    }
}

/// Guard over one open sub-archive.
///
/// Derefs to the parent [`ArchiveWriter`], so everything written through it lands in the
/// sub-archive.
pub struct SubArchiveWriter<'w> {
    writer: &'w mut ArchiveWriter,
    level: usize,
    closed: bool,
}

impl SubArchiveWriter<'_> {
    /// Close the sub-archive and write it into the parent
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let open = self.writer.frames.len();
        if open != self.level {
            return Err(ArchiveError::UnbalancedSubArchive {
                open,
                expected: self.level,
            });
        }
        self.writer.end_sub_archive()
    }
}

impl Deref for SubArchiveWriter<'_> {
    type Target = ArchiveWriter;

    fn deref(&self) -> &ArchiveWriter {
        self.writer
    }
}

impl DerefMut for SubArchiveWriter<'_> {
    fn deref_mut(&mut self) -> &mut ArchiveWriter {
        self.writer
    }
}

impl Drop for SubArchiveWriter<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.finish() {
                warn!(error = %e, level = self.level, "Failed to close sub-archive on drop");
            }
        }
    }
}
