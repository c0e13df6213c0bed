//! # Keyed Sections
//!
//! A keyed section is a sub-archive of `(key: u16, value sub-archive)` entries. The reader
//! indexes the entries before handing control to the caller, so fields can be fetched by key in
//! any order and unknown keys are ignored.
//!
//! ```rust
//! use graph_archive::{ArchiveReader, ArchiveWriter, TypeRegistry};
//!
//! let registry = TypeRegistry::new().into_shared();
//! let mut writer = ArchiveWriter::new(registry.clone());
//! writer.write_keyed(|k| {
//!     k.field(1, &String::from("name"))?;
//!     k.field(2, &42u32)
//! })?;
//! let bytes = writer.finalize()?;
//!
//! let mut reader = ArchiveReader::open(bytes, registry)?;
//! let (count, name) = reader.read_keyed(|k| {
//!     let count: u32 = k.get(2)?;
//!     let name: String = k.get(1)?;
//!     Ok((count, name))
//! })?;
//! assert_eq!((count, name.as_str()), (42, "name"));
//! # Ok::<(), graph_archive::ArchiveError>(())
//! ```

use crate::core::reader::{ArchiveReader, RegionKind};
use crate::core::value::ArchiveValue;
use crate::core::writer::ArchiveWriter;
use crate::error::{ArchiveError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Writes the entries of one keyed section
pub struct KeyedWriter<'w> {
    writer: &'w mut ArchiveWriter,
    seen: BTreeSet<u16>,
}

impl KeyedWriter<'_> {
    /// Write `value` under `key`
    pub fn field<V: ArchiveValue>(&mut self, key: u16, value: &V) -> Result<()> {
        self.field_with(key, |w| value.write_to(w))
    }

    /// Write whatever `body` writes under `key`
    pub fn field_with<F>(&mut self, key: u16, body: F) -> Result<()>
    where
        F: FnOnce(&mut ArchiveWriter) -> Result<()>,
    {
        if !self.seen.insert(key) {
            return Err(ArchiveError::DuplicateKey { key });
        }
        self.writer.write_u16(key)?;
        self.writer.sub_archive(body)
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Random access to the entries of one keyed section
pub struct KeyedReader<'r> {
    reader: &'r mut ArchiveReader,
    entries: BTreeMap<u16, (usize, usize)>,
    section_at: usize,
}

impl KeyedReader<'_> {
    /// Whether the section holds `key`
    pub fn contains(&self, key: u16) -> bool {
        self.entries.contains_key(&key)
    }

    /// Keys present in the section, ascending
    pub fn keys(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }

    /// Read the value stored under `key`
    pub fn get<V: ArchiveValue>(&mut self, key: u16) -> Result<V> {
        self.get_with(key, V::read_from)
    }

    /// Read the value stored under `key`, or `None` when the key is absent
    pub fn get_optional<V: ArchiveValue>(&mut self, key: u16) -> Result<Option<V>> {
        if self.contains(key) {
            self.get(key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Run `body` over the entry stored under `key`; it must consume the whole entry
    pub fn get_with<R, F>(&mut self, key: u16, body: F) -> Result<R>
    where
        F: FnOnce(&mut ArchiveReader) -> Result<R>,
    {
        let (start, end) = *self.entries.get(&key).ok_or(ArchiveError::MissingKey {
            key,
            offset: self.section_at,
        })?;
        self.reader.in_region(start, end, RegionKind::Entry, body)
    }
}

impl ArchiveWriter {
    /// Write a keyed section; `body` adds its entries through the [`KeyedWriter`]
    pub fn write_keyed<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut KeyedWriter<'_>) -> Result<()>,
    {
        self.sub_archive(|w| {
            let mut keyed = KeyedWriter {
                writer: w,
                seen: BTreeSet::new(),
            };
            body(&mut keyed)
        })
    }
}

impl ArchiveReader {
    /// Index a keyed section, then let `body` read its entries in any order
    pub fn read_keyed<R, F>(&mut self, body: F) -> Result<R>
    where
        F: FnOnce(&mut KeyedReader<'_>) -> Result<R>,
    {
        let section_at = self.position();
        self.sub_archive(|r| {
            let mut entries = BTreeMap::new();
            while r.remaining() > 0 {
                let key = r.read_u16()?;
                let len = r.read_u32()? as usize;
                let start = r.advance(len)?;
                if entries.insert(key, (start, start + len)).is_some() {
                    return Err(ArchiveError::DuplicateKey { key });
                }
            }
            let mut keyed = KeyedReader {
                reader: r,
                entries,
                section_at,
            };
            body(&mut keyed)
        })
    }
}
