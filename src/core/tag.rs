//! Stable type tags.
//!
//! A tag is the 64-bit FNV-1a hash of a type's registered name. The hash is a `const fn`
//! with fixed parameters, so a tag never changes between builds while the name stays the same;
//! renaming a type deliberately breaks decoding of archives written under the old name.

use serde::{Deserialize, Serialize};
use std::fmt;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable 64-bit identifier of a registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub u64);

impl TypeTag {
    /// Tag written in front of an empty polymorphic slot; never registrable
    pub const NONE: TypeTag = TypeTag(0);

    /// Derive the tag for a registered name
    pub const fn of(name: &str) -> TypeTag {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        TypeTag(hash)
    }

    /// Raw tag value
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this is the empty-slot tag
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
