//! # Archive Reader
//!
//! Two-pass decoder. Pass one runs in [`ArchiveReader::open`]: it validates the trailer and
//! loads the reference table. Pass two is driven by the caller's `read_*` calls, which walk the
//! body region in the order the writer produced it.
//!
//! ## Identity arena
//! Every identity decoded so far lives in an arena keyed by identity:
//!
//! - **InProgress**: a blank instance from the factory is registered before its fields are
//!   decoded, so a reference reached while decoding its own body (a cycle) receives a clone of
//!   that same handle. It is the forward placeholder.
//! - **Materialized**: the body finished decoding. Because every placeholder handed out is the
//!   same allocation, promotion is all the patching needed.
//!
//! A reference to an identity whose body the cursor has not reached yet is resolved by seeking
//! to the offset in the reference table, decoding the body there and returning to the cursor.
//! When the cursor later reaches that body it is skipped.
//!
//! ```rust
//! use graph_archive::{encode, ArchiveReader, TypeRegistry};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let registry = TypeRegistry::new().into_shared();
//! let shared = Rc::new(RefCell::new(String::from("one")));
//! let bytes = encode(&registry, &(shared.clone(), shared))?;
//!
//! let mut reader = ArchiveReader::open(bytes, registry)?;
//! let (a, b): (Rc<RefCell<String>>, Rc<RefCell<String>>) = reader.read()?;
//! assert!(Rc::ptr_eq(&a, &b));
//! # Ok::<(), graph_archive::ArchiveError>(())
//! ```

use crate::config::ReaderConfig;
use crate::core::endian::FixedWidth;
use crate::core::object::{ObjectHandle, Record};
use crate::core::registry::TypeRegistry;
use crate::core::tag::TypeTag;
use crate::core::value::{ArchiveValue, Primitive};
use crate::core::wire::{load_table, Trailer, MARKER_BODY, MARKER_NULL, MARKER_REF};
use crate::error::{constants, ArchiveError, Result};
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// Decode state of one identity
#[derive(Debug)]
enum SlotState {
    InProgress(ObjectHandle),
    Materialized(ObjectHandle),
}

impl SlotState {
    fn handle(&self) -> &ObjectHandle {
        match self {
            SlotState::InProgress(handle) | SlotState::Materialized(handle) => handle,
        }
    }
}

/// What bounds the current read region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegionKind {
    Body,
    SubArchive,
    Entry,
}

#[derive(Debug, Clone, Copy)]
struct Region {
    end: usize,
    kind: RegionKind,
}

/// Decoder for one finished archive
pub struct ArchiveReader {
    buffer: Bytes,
    registry: Arc<TypeRegistry>,
    /// Body offset (position of `body_len`) per identity
    offsets: Vec<u32>,
    arena: HashMap<u32, SlotState>,
    cursor: usize,
    /// End of the body region
    body_end: usize,
    regions: Vec<Region>,
    depth: usize,
    max_depth: usize,
    max_text_len: usize,
}

impl ArchiveReader {
    /// Open an archive with default limits
    pub fn open(buffer: impl Into<Bytes>, registry: Arc<TypeRegistry>) -> Result<Self> {
        Self::open_with_config(buffer, registry, &ReaderConfig::default())
    }

    /// Validate the trailer, load the reference table and position the cursor at the root value
    #[instrument(skip_all)]
    pub fn open_with_config(
        buffer: impl Into<Bytes>,
        registry: Arc<TypeRegistry>,
        config: &ReaderConfig,
    ) -> Result<Self> {
        let buffer = buffer.into();
        match Self::load(buffer, registry, config) {
            Ok(reader) => Ok(reader),
            Err(e) => {
                global_metrics().decode_error();
                warn!(error = %e, "Rejected archive");
                Err(e)
            }
        }
    }

    fn load(buffer: Bytes, registry: Arc<TypeRegistry>, config: &ReaderConfig) -> Result<Self> {
        if buffer.len() > config.max_archive_size {
            return Err(ArchiveError::SizeLimitExceeded {
                size: buffer.len(),
                limit: config.max_archive_size,
            });
        }

        let trailer = Trailer::parse(&buffer)?;
        let offsets = load_table(&buffer, &trailer)?;
        let body_end = trailer.body_len(buffer.len());

        global_metrics().archive_read(buffer.len() as u64);
        debug!(
            bytes = buffer.len(),
            body = body_end,
            identities = offsets.len(),
            "Opened archive"
        );

        Ok(Self {
            buffer,
            registry,
            offsets,
            arena: HashMap::new(),
            cursor: 0,
            body_end,
            regions: Vec::new(),
            depth: 0,
            max_depth: config.max_depth,
            max_text_len: config.max_text_len,
        })
    }

    /// Registry used for polymorphic slots
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Absolute position of the cursor
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes left in the current region (body, sub-archive or the whole body region)
    pub fn remaining(&self) -> usize {
        self.limit().saturating_sub(self.cursor)
    }

    /// Number of identities listed in the reference table
    pub fn identity_count(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the body of `identity` has been fully decoded
    pub fn is_materialized(&self, identity: u32) -> bool {
        matches!(self.arena.get(&identity), Some(SlotState::Materialized(_)))
    }

    // ------------------------------------------------------------------
    // Raw input
    // ------------------------------------------------------------------

    fn limit(&self) -> usize {
        self.regions.last().map_or(self.body_end, |r| r.end)
    }

    /// Consume `n` bytes of the current region, returning where they start
    pub(crate) fn advance(&mut self, n: usize) -> Result<usize> {
        let available = self.remaining();
        if n > available {
            return Err(ArchiveError::TruncatedStream {
                offset: self.cursor,
                needed: n,
                available,
            });
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(start)
    }

    /// Run `body` with the cursor at `start` and reads bounded by `end`, then put the cursor back.
    ///
    /// Fails if `body` leaves bytes of the region unread.
    pub(crate) fn in_region<R, F>(
        &mut self,
        start: usize,
        end: usize,
        kind: RegionKind,
        body: F,
    ) -> Result<R>
    where
        F: FnOnce(&mut ArchiveReader) -> Result<R>,
    {
        let saved = self.cursor;
        let open = self.regions.len();
        self.cursor = start;
        self.regions.push(Region { end, kind });

        let out = body(self).and_then(|out| {
            if self.regions.len() != open + 1 {
                return Err(ArchiveError::UnbalancedSubArchive {
                    open: self.regions.len() - open,
                    expected: 1,
                });
            }
            if self.cursor != end {
                return Err(ArchiveError::mismatch(
                    self.cursor,
                    "end of region",
                    format!("{} ({} bytes)", constants::ERR_TRAILING_BYTES, end - self.cursor),
                ));
            }
            Ok(out)
        });

        self.regions.truncate(open);
        self.cursor = saved;
        out
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    /// Read any fixed-width primitive
    pub fn read_primitive<P: Primitive>(&mut self) -> Result<P> {
        P::get(self)
    }

    pub(crate) fn read_fixed<T: FixedWidth>(&mut self) -> Result<T> {
        let start = self.advance(T::WIDTH)?;
        let mut bytes = T::Bytes::default();
        bytes
            .as_mut()
            .copy_from_slice(&self.buffer[start..start + T::WIDTH]);
        Ok(T::from_wire(bytes))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let start = self.advance(1)?;
        Ok(self.buffer[start])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_fixed()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_fixed()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_fixed()
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_fixed()
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_fixed()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_fixed()
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_fixed()
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_fixed()
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_fixed()
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let at = self.cursor;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(ArchiveError::mismatch(
                at,
                "bool",
                format!("{} (0x{byte:02x})", constants::ERR_INVALID_BOOL),
            )),
        }
    }

    /// Read a length-prefixed byte run without copying
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_u32()? as usize;
        if len > self.max_text_len {
            return Err(ArchiveError::SizeLimitExceeded {
                size: len,
                limit: self.max_text_len,
            });
        }
        let start = self.advance(len)?;
        Ok(self.buffer.slice(start..start + len))
    }

    /// Read length-prefixed UTF-8 text
    pub fn read_string(&mut self) -> Result<String> {
        let at = self.cursor;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ArchiveError::mismatch(at, "string", constants::ERR_INVALID_UTF8))
    }

    /// Read any archivable value
    pub fn read<V: ArchiveValue>(&mut self) -> Result<V> {
        V::read_from(self)
    }

    /// Decode a `serde` value written with `write_serde`
    pub fn read_serde<T: DeserializeOwned>(&mut self) -> Result<T> {
        let payload = self.read_bytes()?;
        Ok(bincode::deserialize(&payload)?)
    }

    // ------------------------------------------------------------------
    // Sub-archives
    // ------------------------------------------------------------------

    /// Enter a sub-archive; reads are bounded by its length until `end_sub_archive`
    pub fn begin_sub_archive(&mut self) -> Result<()> {
        let len = self.read_u32()? as usize;
        let available = self.remaining();
        if len > available {
            return Err(ArchiveError::TruncatedStream {
                offset: self.cursor,
                needed: len,
                available,
            });
        }
        self.regions.push(Region {
            end: self.cursor + len,
            kind: RegionKind::SubArchive,
        });
        Ok(())
    }

    /// Leave the innermost sub-archive, which must have been read to its end
    pub fn end_sub_archive(&mut self) -> Result<()> {
        match self.regions.last() {
            Some(region) if region.kind == RegionKind::SubArchive => {
                if self.cursor != region.end {
                    return Err(ArchiveError::mismatch(
                        self.cursor,
                        "end of sub-archive",
                        format!(
                            "{} ({} bytes)",
                            constants::ERR_TRAILING_BYTES,
                            region.end - self.cursor
                        ),
                    ));
                }
                self.regions.pop();
                Ok(())
            }
            _ => Err(ArchiveError::UnbalancedSubArchive {
                open: 0,
                expected: 1,
            }),
        }
    }

    /// Skip a whole sub-archive without decoding it.
    ///
    /// Objects first written inside it stay reachable: a later reference seeks to them.
    pub fn skip_sub_archive(&mut self) -> Result<()> {
        let len = self.read_u32()? as usize;
        self.advance(len)?;
        trace!(len, "Skipped sub-archive");
        Ok(())
    }

    /// Run `body` inside a sub-archive
    pub fn sub_archive<R, F>(&mut self, body: F) -> Result<R>
    where
        F: FnOnce(&mut ArchiveReader) -> Result<R>,
    {
        self.begin_sub_archive()?;
        let out = body(self)?;
        self.end_sub_archive()?;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Object slots
    // ------------------------------------------------------------------

    /// Read a typed, non-null object slot
    pub fn read_object<T: Record + Default>(&mut self) -> Result<Rc<RefCell<T>>> {
        let at = self.cursor;
        match self.read_optional_object::<T>()? {
            Some(object) => Ok(object),
            None => Err(ArchiveError::mismatch(
                at,
                std::any::type_name::<T>(),
                constants::ERR_UNEXPECTED_NULL,
            )),
        }
    }

    /// Read a typed object slot that may be empty
    pub fn read_optional_object<T: Record + Default>(&mut self) -> Result<Option<Rc<RefCell<T>>>> {
        let at = self.cursor;
        let make = || ObjectHandle::new(T::default());
        match self.read_slot(&make)? {
            Some(handle) => downcast_at::<T>(&handle, at).map(Some),
            None => Ok(None),
        }
    }

    /// Read a base-typed, non-null slot
    pub fn read_polymorphic(&mut self) -> Result<ObjectHandle> {
        let at = self.cursor;
        self.read_optional_polymorphic()?.ok_or_else(|| {
            ArchiveError::mismatch(at, "polymorphic object", constants::ERR_UNEXPECTED_NULL)
        })
    }

    /// Read a base-typed slot and recover its concrete type
    pub fn read_polymorphic_as<T: Record>(&mut self) -> Result<Rc<RefCell<T>>> {
        let at = self.cursor;
        let handle = self.read_polymorphic()?;
        downcast_at::<T>(&handle, at)
    }

    /// Read a base-typed slot that may be empty
    pub fn read_optional_polymorphic(&mut self) -> Result<Option<ObjectHandle>> {
        let at = self.cursor;
        let tag = TypeTag(self.read_u64()?);

        if tag.is_none() {
            let marker_at = self.cursor;
            return match self.read_u8()? {
                MARKER_NULL => Ok(None),
                marker => Err(ArchiveError::mismatch(
                    marker_at,
                    "null slot after empty type tag",
                    format!("marker 0x{marker:02x}"),
                )),
            };
        }

        let registry = self.registry.clone();
        let entry = registry
            .resolve(tag)
            .map_err(|_| ArchiveError::UnknownType {
                tag,
                offset: Some(at),
            })?;
        let make = || entry.instantiate();

        let slot_at = self.cursor;
        match self.read_slot(&make)? {
            Some(handle) if handle.concrete_type_id() == entry.type_id() => Ok(Some(handle)),
            Some(handle) => Err(ArchiveError::mismatch(
                slot_at,
                entry.name(),
                format!(
                    "{} ({})",
                    constants::ERR_WRONG_CONCRETE_TYPE,
                    handle.rust_type_name()
                ),
            )),
            None => Err(ArchiveError::mismatch(
                slot_at,
                entry.name(),
                constants::ERR_UNEXPECTED_NULL,
            )),
        }
    }

    /// Decode (or return the already decoded) object with `identity`, wherever its body lies.
    ///
    /// The sequential cursor is left where it was.
    pub fn read_identity<T: Record + Default>(&mut self, identity: u32) -> Result<Rc<RefCell<T>>> {
        let at = self.cursor;
        let make = || ObjectHandle::new(T::default());
        let handle = self.resolve_identity(identity, &make)?;
        downcast_at::<T>(&handle, at)
    }

    /// Read one object slot: NULL, BODY or REF
    fn read_slot(&mut self, make: &dyn Fn() -> ObjectHandle) -> Result<Option<ObjectHandle>> {
        let marker_at = self.cursor;
        match self.read_u8()? {
            MARKER_NULL => Ok(None),
            MARKER_REF => {
                let identity = self.read_u32()?;
                self.resolve_identity(identity, make).map(Some)
            }
            MARKER_BODY => self.read_inline_body(make).map(Some),
            marker => Err(ArchiveError::mismatch(
                marker_at,
                "object slot marker",
                format!("{} (0x{marker:02x})", constants::ERR_UNKNOWN_MARKER),
            )),
        }
    }

    /// BODY marker at the cursor: decode in place, or skip if random access got there first
    fn read_inline_body(&mut self, make: &dyn Fn() -> ObjectHandle) -> Result<ObjectHandle> {
        let identity = self.read_u32()?;
        let len_at = self.cursor;
        if identity as usize >= self.offsets.len() {
            return Err(ArchiveError::DanglingReference {
                identity,
                offset: len_at - 4,
            });
        }
        if self.offsets[identity as usize] as usize != len_at {
            return Err(ArchiveError::MalformedTrailer {
                reason: constants::ERR_ROW_DISAGREES,
                buffer_len: self.buffer.len(),
            });
        }

        let body_len = self.read_u32()? as usize;
        let start = self.advance(body_len)?;

        if let Some(state) = self.arena.get(&identity) {
            trace!(identity, "Skipped body decoded earlier");
            return Ok(state.handle().clone());
        }
        self.decode_object(identity, make(), start, start + body_len)
    }

    /// REF (or random access): arena hit, or seek to the body through the reference table
    fn resolve_identity(
        &mut self,
        identity: u32,
        make: &dyn Fn() -> ObjectHandle,
    ) -> Result<ObjectHandle> {
        match self.arena.get(&identity) {
            Some(SlotState::Materialized(handle)) => {
                global_metrics().reference_resolved();
                return Ok(handle.clone());
            }
            Some(SlotState::InProgress(handle)) => {
                global_metrics().forward_placeholder();
                trace!(identity, "Resolved reference to object still being decoded");
                return Ok(handle.clone());
            }
            None => {}
        }

        let len_at = match self.offsets.get(identity as usize) {
            Some(&offset) => offset as usize,
            None => {
                return Err(ArchiveError::DanglingReference {
                    identity,
                    offset: self.cursor,
                })
            }
        };

        // The row must point just past `0x01 identity`
        let marker_ok = len_at >= 5
            && self.buffer[len_at - 5] == MARKER_BODY
            && self.buffer[len_at - 4..len_at] == identity.to_wire();
        if !marker_ok {
            return Err(ArchiveError::MalformedTrailer {
                reason: constants::ERR_ROW_DISAGREES,
                buffer_len: self.buffer.len(),
            });
        }

        let mut len = [0u8; 4];
        len.copy_from_slice(&self.buffer[len_at..len_at + 4]);
        let start = len_at + 4;
        let end = start + u32::from_wire(len) as usize;
        if end > self.body_end {
            return Err(ArchiveError::TruncatedStream {
                offset: start,
                needed: end - start,
                available: self.body_end - start,
            });
        }

        trace!(identity, offset = len_at, "Seeking to body");
        self.decode_object(identity, make(), start, end)
    }

    /// Register `handle` as in progress, decode its fields from `start..end`, then promote it
    fn decode_object(
        &mut self,
        identity: u32,
        handle: ObjectHandle,
        start: usize,
        end: usize,
    ) -> Result<ObjectHandle> {
        if self.depth >= self.max_depth {
            return Err(ArchiveError::DepthLimitExceeded {
                depth: self.depth + 1,
                limit: self.max_depth,
            });
        }

        self.arena
            .insert(identity, SlotState::InProgress(handle.clone()));
        self.depth += 1;
        let decoded = self.in_region(start, end, RegionKind::Body, |r| {
            match handle.cell().try_borrow_mut() {
                Ok(mut record) => record.decode(r),
                Err(_) => Err(ArchiveError::BorrowConflict { identity }),
            }
        });
        self.depth -= 1;

        if let Err(e) = decoded {
            // counted once, by the outermost body
            if self.depth == 0 {
                global_metrics().decode_error();
            }
            return Err(e);
        }

        self.arena
            .insert(identity, SlotState::Materialized(handle.clone()));
        global_metrics().object_decoded();
        trace!(
            identity,
            offset = start - 4,
            type_name = handle.rust_type_name(),
            "Decoded object body"
        );
        Ok(handle)
    }
}

fn downcast_at<T: Record>(handle: &ObjectHandle, at: usize) -> Result<Rc<RefCell<T>>> {
    handle.downcast::<T>().ok_or_else(|| {
        ArchiveError::mismatch(
            at,
            std::any::type_name::<T>(),
            format!(
                "{} ({})",
                constants::ERR_WRONG_CONCRETE_TYPE,
                handle.rust_type_name()
            ),
        )
    })
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("len", &self.buffer.len())
            .field("cursor", &self.cursor)
            .field("identities", &self.offsets.len())
            .field("decoded", &self.arena.len())
            .finish()
    }
}
