//! # Runtime Objects
//!
//! The archive serializes instances owned by shared, reference-counted cells
//! (`Rc<RefCell<T>>`). It never manages their lifetime; it only records which slots point at
//! the same allocation so the reader can hand back one shared instance per identity.
//!
//! A type takes part by implementing [`Record`]. The implementation doubles as the type's field
//! codec: `encode` writes the fields in order and `decode` reads them back, in the same order,
//! into a blank instance produced by a factory.
//!
//! ```rust
//! use graph_archive::{ArchiveReader, ArchiveWriter, Record, Result};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! #[derive(Default)]
//! struct Node {
//!     value: u32,
//!     next: Option<Rc<RefCell<Node>>>,
//! }
//!
//! impl Record for Node {
//!     fn type_name(&self) -> &'static str {
//!         "example.node"
//!     }
//!
//!     fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
//!         w.write_u32(self.value)?;
//!         w.write(&self.next)
//!     }
//!
//!     fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
//!         self.value = r.read_u32()?;
//!         self.next = r.read()?;
//!         Ok(())
//!     }
//! }
//! ```

use crate::core::reader::ArchiveReader;
use crate::core::writer::ArchiveWriter;
use crate::error::Result;
use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// A type whose instances can be written to and rebuilt from an archive
pub trait Record: Any {
    /// Stable registered name; hashed into the type tag for polymorphic slots
    fn type_name(&self) -> &'static str;

    /// Write this instance's fields
    fn encode(&self, writer: &mut ArchiveWriter) -> Result<()>;

    /// Read fields, in `encode` order, into this (blank) instance
    fn decode(&mut self, reader: &mut ArchiveReader) -> Result<()>;
}

/// Shared text is a record like any other, so aliased strings are stored once.
impl Record for String {
    fn type_name(&self) -> &'static str {
        "string"
    }

    fn encode(&self, writer: &mut ArchiveWriter) -> Result<()> {
        writer.write_str(self)
    }

    fn decode(&mut self, reader: &mut ArchiveReader) -> Result<()> {
        *self = reader.read_string()?;
        Ok(())
    }
}

/// Type-erased, cloneable handle to a shared runtime object.
///
/// Used for base-typed (polymorphic) slots. Clones point at the same allocation.
#[derive(Clone)]
pub struct ObjectHandle {
    record: Rc<RefCell<dyn Record>>,
    any: Rc<dyn Any>,
    type_id: TypeId,
    rust_name: &'static str,
}

impl ObjectHandle {
    /// Move a value into a fresh shared cell
    pub fn new<T: Record>(value: T) -> Self {
        Self::from_rc(Rc::new(RefCell::new(value)))
    }

    /// Wrap an existing shared cell without copying it
    pub fn from_rc<T: Record>(rc: Rc<RefCell<T>>) -> Self {
        let any: Rc<dyn Any> = rc.clone();
        Self {
            record: rc,
            any,
            type_id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
        }
    }

    /// Recover the concrete shared cell, if this handle holds a `T`
    pub fn downcast<T: Record>(&self) -> Option<Rc<RefCell<T>>> {
        self.any.clone().downcast::<RefCell<T>>().ok()
    }

    /// Whether the handle holds a `T`
    pub fn is<T: Record>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Concrete type of the held instance
    pub fn concrete_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the held instance (diagnostics only)
    pub fn rust_type_name(&self) -> &'static str {
        self.rust_name
    }

    /// Whether both handles point at the same allocation
    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        self.key() == other.key()
    }

    /// Borrow the instance through its `Record` interface
    ///
    /// # Panics
    /// Panics if the instance is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, dyn Record> {
        self.record.borrow()
    }

    /// Referential key: the address of the shared allocation
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.any) as *const () as usize
    }

    pub(crate) fn cell(&self) -> &Rc<RefCell<dyn Record>> {
        &self.record
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("type", &self.rust_name)
            .field("address", &format_args!("{:#x}", self.key()))
            .finish()
    }
}

impl<T: Record> From<Rc<RefCell<T>>> for ObjectHandle {
    fn from(rc: Rc<RefCell<T>>) -> Self {
        ObjectHandle::from_rc(rc)
    }
}
