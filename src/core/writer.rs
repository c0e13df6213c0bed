//! # Archive Writer
//!
//! Encodes values and object graphs into a byte sink, assigning identities and deduplicating
//! shared instances.
//!
//! ## Object slots
//! The first time an instance is written it gets the next identity, a pending row in the
//! reference table, and its body inline at the current position. Every later occurrence of the
//! same allocation is written as a five-byte reference instead. Cycles are therefore safe: by the
//! time a body reaches a pointer back to an enclosing instance, that instance already has an
//! identity.
//!
//! ## Lifecycle
//! One writer per encode session. `finalize` appends the reference table and trailer exactly
//! once; any write after that fails with `FinalizedWriterReuse`. An abandoned writer can simply
//! be dropped.
//!
//! ```rust
//! use graph_archive::{ArchiveWriter, TypeRegistry};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let registry = TypeRegistry::new().into_shared();
//! let shared = Rc::new(RefCell::new(String::from("x")));
//!
//! let mut writer = ArchiveWriter::new(registry);
//! writer.write(&vec![shared.clone(), shared.clone(), shared])?;
//! assert_eq!(writer.identity_count(), 1);
//! let bytes = writer.finalize()?;
//! assert!(!bytes.is_empty());
//! # Ok::<(), graph_archive::ArchiveError>(())
//! ```

use crate::config::{WriterConfig, MAX_ARCHIVE_SIZE};
use crate::core::endian::FixedWidth;
use crate::core::object::{ObjectHandle, Record};
use crate::core::registry::TypeRegistry;
use crate::core::sink::ByteSink;
use crate::core::sub_archive::ScratchFrame;
use crate::core::tag::TypeTag;
use crate::core::value::{ArchiveValue, Primitive};
use crate::core::wire::{TableRow, Trailer, MARKER_BODY, MARKER_NULL, MARKER_REF, ROW_SIZE};
use crate::error::{ArchiveError, Result};
use crate::utils::metrics::{global_metrics, Timer};
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Encoder for one archive session
pub struct ArchiveWriter {
    sink: Box<dyn ByteSink>,
    pub(crate) frames: Vec<ScratchFrame>,
    registry: Arc<TypeRegistry>,
    /// Referential key -> identity, plus a clone that pins the allocation for the session
    identities: HashMap<usize, (u32, ObjectHandle)>,
    /// Body offset per identity; `None` while the body is still being written
    rows: Vec<Option<u32>>,
    depth: usize,
    max_depth: usize,
    max_archive_size: usize,
    finalized: bool,
}

impl ArchiveWriter {
    /// Create a writer with default settings over a fresh buffer
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(registry, &WriterConfig::default())
    }

    /// Create a writer over a fresh buffer
    pub fn with_config(registry: Arc<TypeRegistry>, config: &WriterConfig) -> Self {
        let sink = BytesMut::with_capacity(config.initial_capacity);
        Self::build(registry, config, Box::new(sink))
    }

    /// Create a writer over a caller-supplied, empty sink
    pub fn with_sink(
        registry: Arc<TypeRegistry>,
        config: &WriterConfig,
        sink: Box<dyn ByteSink>,
    ) -> Result<Self> {
        if sink.position() != 0 {
            return Err(ArchiveError::ConfigError(format!(
                "Archive sink must start empty (holds {} bytes)",
                sink.position()
            )));
        }
        Ok(Self::build(registry, config, sink))
    }

    fn build(registry: Arc<TypeRegistry>, config: &WriterConfig, sink: Box<dyn ByteSink>) -> Self {
        Self {
            sink,
            frames: Vec::new(),
            registry,
            identities: HashMap::new(),
            rows: Vec::new(),
            depth: 0,
            max_depth: config.max_depth,
            max_archive_size: config.max_archive_size.min(MAX_ARCHIVE_SIZE),
            finalized: false,
        }
    }

    /// Registry used for polymorphic slots
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Absolute position the next byte will land at in the finished archive
    pub fn position(&self) -> usize {
        match self.frames.last() {
            Some(frame) => frame.position(),
            None => self.sink.position(),
        }
    }

    /// Number of identities assigned so far
    pub fn identity_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether `finalize` has run
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    // ------------------------------------------------------------------
    // Raw output
    // ------------------------------------------------------------------

    pub(crate) fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(ArchiveError::FinalizedWriterReuse);
        }
        let size = self.position() + bytes.len();
        if size > self.max_archive_size {
            return Err(ArchiveError::SizeLimitExceeded {
                size,
                limit: self.max_archive_size,
            });
        }
        match self.frames.last_mut() {
            Some(frame) => frame.append(bytes),
            None => self.sink.append(bytes),
        }
        Ok(())
    }

    /// Overwrite bytes already written at the current nesting level.
    ///
    /// `None` if `at` does not fall inside that level.
    pub(crate) fn patch(&mut self, at: usize, bytes: &[u8]) -> Option<()> {
        match self.frames.last_mut() {
            Some(frame) => frame.patch(at, bytes),
            None if at + bytes.len() <= self.sink.position() => {
                self.sink.patch(at, bytes);
                Some(())
            }
            None => None,
        }
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    /// Write any fixed-width primitive
    pub fn write_primitive<P: Primitive>(&mut self, value: P) -> Result<()> {
        value.put(self)
    }

    /// Write a fixed-width numeric in wire order
    pub(crate) fn write_fixed<T: FixedWidth>(&mut self, value: T) -> Result<()> {
        let bytes = value.to_wire();
        self.put(bytes.as_ref())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.put(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_fixed(value)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.put(&[value as u8])
    }

    /// Write text as a `u32` length followed by UTF-8 bytes
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write a length-prefixed byte run
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        let len = self.wire_len(value.len())?;
        self.write_u32(len)?;
        self.put(value)
    }

    /// Write any archivable value
    pub fn write<V: ArchiveValue>(&mut self, value: &V) -> Result<()> {
        value.write_to(self)
    }

    /// Encode a `serde` value with `bincode` inside a length-framed region
    pub fn write_serde<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let payload = bincode::serialize(value)?;
        self.write_bytes(&payload)
    }

    pub(crate) fn wire_len(&self, len: usize) -> Result<u32> {
        u32::try_from(len).map_err(|_| ArchiveError::SizeLimitExceeded {
            size: len,
            limit: MAX_ARCHIVE_SIZE,
        })
    }

    // ------------------------------------------------------------------
    // Object slots
    // ------------------------------------------------------------------

    /// Write a typed, non-null object slot
    pub fn write_object<T: Record>(&mut self, object: &Rc<RefCell<T>>) -> Result<()> {
        self.write_handle(&ObjectHandle::from_rc(object.clone()))
    }

    /// Write a typed object slot that may be empty
    pub fn write_optional_object<T: Record>(
        &mut self,
        object: Option<&Rc<RefCell<T>>>,
    ) -> Result<()> {
        match object {
            Some(object) => self.write_object(object),
            None => self.write_u8(MARKER_NULL),
        }
    }

    /// Write an object slot without a type tag.
    ///
    /// The body is written inline the first time this allocation is seen; afterwards only a
    /// reference to its identity is written.
    pub fn write_handle(&mut self, handle: &ObjectHandle) -> Result<()> {
        if self.finalized {
            return Err(ArchiveError::FinalizedWriterReuse);
        }

        if let Some(&(identity, _)) = self.identities.get(&handle.key()) {
            self.write_u8(MARKER_REF)?;
            self.write_u32(identity)?;
            global_metrics().reference_written();
            trace!(identity, "Wrote reference");
            return Ok(());
        }

        if self.depth >= self.max_depth {
            return Err(ArchiveError::DepthLimitExceeded {
                depth: self.depth + 1,
                limit: self.max_depth,
            });
        }

        let identity = self.wire_len(self.rows.len())?;
        self.identities
            .insert(handle.key(), (identity, handle.clone()));
        self.rows.push(None);

        self.write_u8(MARKER_BODY)?;
        self.write_u32(identity)?;
        let body_at = self.position();
        self.write_u32(0)?;

        let open_frames = self.frames.len();
        self.depth += 1;
        let encoded = match handle.cell().try_borrow() {
            Ok(record) => record.encode(self),
            Err(_) => Err(ArchiveError::BorrowConflict { identity }),
        };
        self.depth -= 1;
        if let Err(e) = encoded {
            // counted once, by the outermost body
            if self.depth == 0 {
                global_metrics().encode_error();
            }
            return Err(e);
        }

        // a body that swapped frames leaves `body_at` outside the current one
        let unbalanced = ArchiveError::UnbalancedSubArchive {
            open: self.frames.len(),
            expected: open_frames,
        };
        if self.frames.len() != open_frames {
            return Err(unbalanced);
        }
        let written = match self.position().checked_sub(body_at + 4) {
            Some(written) => written,
            None => return Err(unbalanced),
        };
        let body_len = self.wire_len(written)?;
        if self.patch(body_at, &body_len.to_wire()).is_none() {
            return Err(unbalanced);
        }
        self.rows[identity as usize] = Some(self.wire_len(body_at)?);

        global_metrics().object_written();
        trace!(
            identity,
            offset = body_at,
            body_len,
            type_name = handle.rust_type_name(),
            "Wrote object body"
        );
        Ok(())
    }

    /// Write a base-typed slot: the runtime type's tag, then the object slot
    pub fn write_polymorphic(&mut self, handle: &ObjectHandle) -> Result<()> {
        let tag = self
            .registry
            .tag_of(handle.concrete_type_id())
            .ok_or_else(|| ArchiveError::UnknownType {
                tag: TypeTag::of(handle.rust_type_name()),
                offset: Some(self.position()),
            })?;
        self.write_u64(tag.value())?;
        self.write_handle(handle)
    }

    /// Write a base-typed slot that may be empty
    pub fn write_optional_polymorphic(&mut self, handle: Option<&ObjectHandle>) -> Result<()> {
        match handle {
            Some(handle) => self.write_polymorphic(handle),
            None => {
                self.write_u64(TypeTag::NONE.value())?;
                self.write_u8(MARKER_NULL)
            }
        }
    }

    // ------------------------------------------------------------------
    // Finalize
    // ------------------------------------------------------------------

    /// Append the reference table and trailer and hand over the finished archive.
    ///
    /// Fails with `FinalizedWriterReuse` on a second call.
    #[instrument(skip(self))]
    pub fn finalize(&mut self) -> Result<Bytes> {
        if self.finalized {
            return Err(ArchiveError::FinalizedWriterReuse);
        }
        if !self.frames.is_empty() {
            return Err(ArchiveError::UnbalancedSubArchive {
                open: self.frames.len(),
                expected: 0,
            });
        }
        let _timer = Timer::start("archive_finalize");

        let mut tail = Vec::with_capacity(self.rows.len() * ROW_SIZE + 12);
        for (identity, offset) in self.rows.iter().enumerate() {
            let identity = identity as u32;
            let offset = offset.ok_or(ArchiveError::IncompleteObject { identity })?;
            TableRow { identity, offset }.encode_into(&mut tail);
        }
        let row_count = self.wire_len(self.rows.len())?;
        Trailer {
            table_len: self.wire_len(tail.len())?,
            row_count,
        }
        .encode_into(&mut tail);

        self.put(&tail)?;
        self.finalized = true;
        self.identities.clear();

        let bytes = self.sink.take();
        global_metrics().archive_written(bytes.len() as u64);
        debug!(
            bytes = bytes.len(),
            identities = row_count,
            "Finalized archive"
        );
        Ok(bytes)
    }
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("position", &self.position())
            .field("identities", &self.rows.len())
            .field("open_sub_archives", &self.frames.len())
            .field("finalized", &self.finalized)
            .finish()
    }
}
