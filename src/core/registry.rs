//! # Type Registry
//!
//! Maps stable type tags to the factory that produces a blank instance of the type. The
//! produced instance's [`Record`] implementation is the type's field codec.
//!
//! ## Lifecycle
//! Populate first, share second. Registration needs `&mut TypeRegistry`; writers and readers
//! take an `Arc<TypeRegistry>`, after which the registry can no longer change and concurrent
//! lookups need no synchronization. Several independent registries can coexist (one per test,
//! for example). A single process-wide registry may also be installed once with
//! [`TypeRegistry::install_global`].
//!
//! ```rust
//! use graph_archive::TypeRegistry;
//!
//! let mut registry = TypeRegistry::new();
//! let tag = registry.register::<String>().expect("first registration");
//! assert_eq!(registry.resolve(tag).expect("registered").name(), "string");
//! assert!(registry.register::<String>().is_err());
//! let shared = registry.into_shared();
//! assert_eq!(shared.len(), 1);
//! ```

use crate::core::object::{ObjectHandle, Record};
use crate::core::tag::TypeTag;
use crate::error::{ArchiveError, Result};
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Produces a blank instance ready to be decoded into
pub type Factory = Arc<dyn Fn() -> ObjectHandle + Send + Sync>;

static GLOBAL_REGISTRY: OnceCell<Arc<TypeRegistry>> = OnceCell::new();

/// One registered type
#[derive(Clone)]
pub struct TypeEntry {
    tag: TypeTag,
    name: &'static str,
    type_id: TypeId,
    factory: Factory,
}

impl TypeEntry {
    /// Tag the type is registered under
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Registered name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Concrete Rust type produced by the factory
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Construct a blank instance
    pub fn instantiate(&self) -> ObjectHandle {
        (self.factory)()
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .finish()
    }
}

/// Registry of polymorphically decodable types
#[derive(Default)]
pub struct TypeRegistry {
    entries: HashMap<TypeTag, TypeEntry>,
    by_type: HashMap<TypeId, TypeTag>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under the tag derived from its record name
    pub fn register<T: Record + Default>(&mut self) -> Result<TypeTag> {
        let name = T::default().type_name();
        let tag = TypeTag::of(name);
        self.register_with(tag, Arc::new(|| ObjectHandle::new(T::default())))?;
        Ok(tag)
    }

    /// Register a factory under an explicit tag.
    ///
    /// The factory is invoked once to learn the concrete type and its record name.
    pub fn register_with(&mut self, tag: TypeTag, factory: Factory) -> Result<()> {
        let sample = factory();
        let name = sample.borrow().type_name();
        let type_id = sample.concrete_type_id();

        if tag.is_none() || self.entries.contains_key(&tag) || self.by_type.contains_key(&type_id)
        {
            return Err(ArchiveError::DuplicateRegistration {
                tag,
                name: name.to_string(),
            });
        }

        debug!(%tag, name, "Registered archive type");
        self.by_type.insert(type_id, tag);
        self.entries.insert(
            tag,
            TypeEntry {
                tag,
                name,
                type_id,
                factory,
            },
        );
        Ok(())
    }

    /// Look up the entry for a tag
    pub fn resolve(&self, tag: TypeTag) -> Result<&TypeEntry> {
        self.entries
            .get(&tag)
            .ok_or(ArchiveError::UnknownType { tag, offset: None })
    }

    /// Tag registered for a concrete Rust type
    pub fn tag_of(&self, type_id: TypeId) -> Option<TypeTag> {
        self.by_type.get(&type_id).copied()
    }

    /// Whether a tag is registered
    pub fn contains(&self, tag: TypeTag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over registered entries (unordered)
    pub fn entries(&self) -> impl Iterator<Item = &TypeEntry> {
        self.entries.values()
    }

    /// Freeze the registry for sharing with writers and readers
    pub fn into_shared(self) -> Arc<TypeRegistry> {
        Arc::new(self)
    }

    /// Install this registry as the process-wide registry.
    ///
    /// Succeeds once per process; later calls fail with `RegistryAlreadyInstalled`.
    pub fn install_global(self) -> Result<Arc<TypeRegistry>> {
        let shared = self.into_shared();
        GLOBAL_REGISTRY
            .set(shared.clone())
            .map_err(|_| ArchiveError::RegistryAlreadyInstalled)?;
        debug!(types = shared.len(), "Installed global type registry");
        Ok(shared)
    }

    /// The process-wide registry, if one was installed
    pub fn global() -> Option<Arc<TypeRegistry>> {
        GLOBAL_REGISTRY.get().cloned()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.entries.len())
            .finish()
    }
}
