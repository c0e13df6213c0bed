//! # Archivable Values
//!
//! [`ArchiveValue`] is implemented by every value shape the archive understands:
//!
//! | Shape | Encoding |
//! |---|---|
//! | `u8`..`u64`, `i8`..`i64`, `f32`, `f64` | fixed width, little-endian |
//! | `bool` | one byte, `0` or `1` |
//! | `String` | `u32` length, UTF-8 bytes |
//! | `Bytes` | `u32` length, raw bytes |
//! | `Vec<T>` | sub-archive of `u32` count, then items |
//! | `BTreeMap<K, V>` | sub-archive of `u32` count, then key/value pairs in key order |
//! | `(A, B)`, `(A, B, C)` | fields in order |
//! | `Rc<RefCell<T>>`, `Option<Rc<RefCell<T>>>` | typed object slot |
//! | `ObjectHandle`, `Option<ObjectHandle>` | polymorphic object slot (type tag, then slot) |
//!
//! Sequences and mappings are framed so a reader can bound them or skip them whole.

use crate::core::object::{ObjectHandle, Record};
use crate::core::reader::ArchiveReader;
use crate::core::writer::ArchiveWriter;
use crate::error::Result;
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A value that can be written to and read back from an archive
pub trait ArchiveValue: Sized {
    /// Write the value at the writer's position
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()>;

    /// Read a value of this shape at the reader's position
    fn read_from(reader: &mut ArchiveReader) -> Result<Self>;
}

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width scalar: the numeric types and `bool`
pub trait Primitive: Copy + sealed::Sealed {
    #[doc(hidden)]
    fn put(self, writer: &mut ArchiveWriter) -> Result<()>;

    #[doc(hidden)]
    fn get(reader: &mut ArchiveReader) -> Result<Self>;
}

macro_rules! impl_numeric {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                #[inline]
                fn put(self, writer: &mut ArchiveWriter) -> Result<()> {
                    writer.write_fixed(self)
                }

                #[inline]
                fn get(reader: &mut ArchiveReader) -> Result<Self> {
                    reader.read_fixed::<$ty>()
                }
            }

            impl ArchiveValue for $ty {
                fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
                    writer.write_primitive(*self)
                }

                fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
                    reader.read_primitive()
                }
            }
        )*
    };
}

impl_numeric!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl sealed::Sealed for bool {}

impl Primitive for bool {
    fn put(self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_bool(self)
    }

    fn get(reader: &mut ArchiveReader) -> Result<Self> {
        reader.read_bool()
    }
}

impl ArchiveValue for bool {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_bool(*self)
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.read_bool()
    }
}

impl ArchiveValue for String {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_str(self)
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.read_string()
    }
}

impl ArchiveValue for Bytes {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_bytes(self)
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.read_bytes()
    }
}

impl<T: ArchiveValue> ArchiveValue for Vec<T> {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.sub_archive(|w| {
            let count = w.wire_len(self.len())?;
            w.write_u32(count)?;
            for item in self {
                item.write_to(w)?;
            }
            Ok(())
        })
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.sub_archive(|r| {
            let count = r.read_u32()? as usize;
            let mut items = Vec::with_capacity(capacity_hint::<T>(count, r.remaining()));
            for _ in 0..count {
                items.push(T::read_from(r)?);
            }
            Ok(items)
        })
    }
}

/// Preallocation for `count` decoded items, never reserving more memory than `remaining` bytes
fn capacity_hint<T>(count: usize, remaining: usize) -> usize {
    count.min(remaining / std::mem::size_of::<T>().max(1))
}

impl<K, V> ArchiveValue for BTreeMap<K, V>
where
    K: ArchiveValue + Ord,
    V: ArchiveValue,
{
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.sub_archive(|w| {
            let count = w.wire_len(self.len())?;
            w.write_u32(count)?;
            for (key, value) in self {
                key.write_to(w)?;
                value.write_to(w)?;
            }
            Ok(())
        })
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.sub_archive(|r| {
            let count = r.read_u32()?;
            let mut map = BTreeMap::new();
            for _ in 0..count {
                let key = K::read_from(r)?;
                let value = V::read_from(r)?;
                map.insert(key, value);
            }
            Ok(map)
        })
    }
}

impl<A: ArchiveValue, B: ArchiveValue> ArchiveValue for (A, B) {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        self.0.write_to(writer)?;
        self.1.write_to(writer)
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        let a = A::read_from(reader)?;
        let b = B::read_from(reader)?;
        Ok((a, b))
    }
}

impl<A: ArchiveValue, B: ArchiveValue, C: ArchiveValue> ArchiveValue for (A, B, C) {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        self.0.write_to(writer)?;
        self.1.write_to(writer)?;
        self.2.write_to(writer)
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        let a = A::read_from(reader)?;
        let b = B::read_from(reader)?;
        let c = C::read_from(reader)?;
        Ok((a, b, c))
    }
}

impl<T: Record + Default> ArchiveValue for Rc<RefCell<T>> {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_object(self)
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.read_object()
    }
}

impl<T: Record + Default> ArchiveValue for Option<Rc<RefCell<T>>> {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_optional_object(self.as_ref())
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.read_optional_object()
    }
}

impl ArchiveValue for ObjectHandle {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_polymorphic(self)
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.read_polymorphic()
    }
}

impl ArchiveValue for Option<ObjectHandle> {
    fn write_to(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_optional_polymorphic(self.as_ref())
    }

    fn read_from(reader: &mut ArchiveReader) -> Result<Self> {
        reader.read_optional_polymorphic()
    }
}
