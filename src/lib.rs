//! # Graph Archive
//!
//! Binary serialization for object graphs: shared instances are written once and come back as
//! one shared instance, cycles survive a round trip, and base-typed slots are rebuilt as the
//! concrete type that was written.
//!
//! ## Overview
//! - [`ArchiveWriter`] encodes values and objects into a buffer, assigning each distinct instance
//!   an identity and writing later occurrences as references.
//! - [`ArchiveReader`] validates the trailer and reference table, then decodes in write order,
//!   seeking through the table for references to bodies it has not reached yet.
//! - [`TypeRegistry`] maps stable [`TypeTag`]s to factories for polymorphic slots.
//! - Sub-archives and keyed sections give length-framed regions that can be bounded, skipped or
//!   read by key.
//!
//! ## Example
//! ```rust
//! use graph_archive::{decode, encode, ArchiveReader, ArchiveWriter, Record, Result, TypeRegistry};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! #[derive(Default)]
//! struct Employee {
//!     name: String,
//!     manager: Option<Rc<RefCell<Employee>>>,
//! }
//!
//! impl Record for Employee {
//!     fn type_name(&self) -> &'static str {
//!         "example.employee"
//!     }
//!
//!     fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
//!         w.write_str(&self.name)?;
//!         w.write(&self.manager)
//!     }
//!
//!     fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
//!         self.name = r.read_string()?;
//!         self.manager = r.read()?;
//!         Ok(())
//!     }
//! }
//!
//! let boss = Rc::new(RefCell::new(Employee { name: "ada".into(), manager: None }));
//! let team: Vec<Rc<RefCell<Employee>>> = ["bo", "cy"]
//!     .iter()
//!     .map(|n| Rc::new(RefCell::new(Employee { name: n.to_string(), manager: Some(boss.clone()) })))
//!     .collect();
//!
//! let registry = TypeRegistry::new().into_shared();
//! let bytes = encode(&registry, &team)?;
//! let back: Vec<Rc<RefCell<Employee>>> = decode(&registry, bytes)?;
//!
//! let first = back[0].borrow().manager.clone().unwrap();
//! let second = back[1].borrow().manager.clone().unwrap();
//! assert!(Rc::ptr_eq(&first, &second));
//! assert_eq!(first.borrow().name, "ada");
//! # Ok::<(), graph_archive::ArchiveError>(())
//! ```
//!
//! ## Threading
//! A writer or reader is a single-threaded session (objects live in `Rc<RefCell<_>>`). Separate
//! sessions may run on separate threads sharing one `Arc<TypeRegistry>`.

pub mod config;
pub mod core;
pub mod error;
pub mod utils;

pub use crate::config::{ArchiveConfig, ReaderConfig, WriterConfig};
pub use crate::core::keyed::{KeyedReader, KeyedWriter};
pub use crate::core::object::{ObjectHandle, Record};
pub use crate::core::reader::ArchiveReader;
pub use crate::core::registry::{TypeEntry, TypeRegistry};
pub use crate::core::sink::ByteSink;
pub use crate::core::sub_archive::SubArchiveWriter;
pub use crate::core::tag::TypeTag;
pub use crate::core::value::{ArchiveValue, Primitive};
pub use crate::core::writer::ArchiveWriter;
pub use crate::core::{decode, encode};
pub use crate::error::{ArchiveError, Result};
