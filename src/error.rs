//! # Error Types
//!
//! Error handling for the archive engine.
//!
//! Every failure is terminal for the operation in progress: the writer and reader never
//! recover silently, and a corrupted buffer cannot be fixed by reading it again.
//!
//! ## Error Categories
//! - **Registry Errors**: unknown or duplicate type tags
//! - **Stream Errors**: truncation, dangling references, malformed trailers, shape mismatches
//! - **Session Errors**: writing after finalize, unbalanced sub-archives, resource limits
//! - **Ambient Errors**: I/O, configuration, and `bincode` payload failures
//!
//! Each variant carries the byte offset and/or identity needed to locate the cause.
//!
//! ## Example Usage
//! ```rust
//! use graph_archive::error::{ArchiveError, Result};
//! use tracing::error;
//!
//! fn check(buffer: &[u8]) -> Result<()> {
//!     if buffer.len() < 12 {
//!         return Err(ArchiveError::TruncatedStream {
//!             offset: 0,
//!             needed: 12,
//!             available: buffer.len(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! if let Err(e) = check(&[0u8; 4]) {
//!     error!(error = %e, "Rejected archive");
//! }
//! ```

use crate::core::tag::TypeTag;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Trailer validation messages
    pub const ERR_TABLE_LENGTH: &str = "reference table length does not match row count";
    pub const ERR_TABLE_OVERRUN: &str = "reference table larger than buffer";
    pub const ERR_ROW_ORDER: &str = "reference table rows are not dense and ordered by identity";
    pub const ERR_ROW_OFFSET: &str = "reference table row points outside the body region";
    pub const ERR_ROW_DISAGREES: &str = "body position disagrees with its reference table row";

    /// Shape mismatch messages
    pub const ERR_INVALID_BOOL: &str = "boolean byte is neither 0 nor 1";
    pub const ERR_INVALID_UTF8: &str = "text is not valid UTF-8";
    pub const ERR_UNEXPECTED_NULL: &str = "null in a non-optional object slot";
    pub const ERR_UNKNOWN_MARKER: &str = "unknown object slot marker";
    pub const ERR_TRAILING_BYTES: &str = "region has unread bytes";
    pub const ERR_WRONG_CONCRETE_TYPE: &str = "instance has a different concrete type";
}

/// ArchiveError is the error type for all archive operations
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unknown type tag {tag} at offset {offset:?}")]
    UnknownType { tag: TypeTag, offset: Option<usize> },

    #[error("Duplicate registration of tag {tag} ({name})")]
    DuplicateRegistration { tag: TypeTag, name: String },

    #[error("Truncated stream at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedStream {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Dangling reference to identity {identity} at offset {offset}")]
    DanglingReference { identity: u32, offset: usize },

    #[error("Malformed trailer ({reason}) in buffer of {buffer_len} bytes")]
    MalformedTrailer {
        reason: &'static str,
        buffer_len: usize,
    },

    #[error("Type mismatch at offset {offset}: expected {expected}, {found}")]
    TypeMismatch {
        offset: usize,
        expected: &'static str,
        found: String,
    },

    #[error("Writer already finalized")]
    FinalizedWriterReuse,

    #[error("Unbalanced sub-archive: {open} frame(s) open, expected {expected}")]
    UnbalancedSubArchive { open: usize, expected: usize },

    #[error("Archive size limit exceeded: {size} bytes (limit {limit})")]
    SizeLimitExceeded { size: usize, limit: usize },

    #[error("Object nesting depth {depth} exceeds limit {limit}")]
    DepthLimitExceeded { depth: usize, limit: usize },

    #[error("Object with identity {identity} is already mutably borrowed")]
    BorrowConflict { identity: u32 },

    #[error("Object with identity {identity} was never completed")]
    IncompleteObject { identity: u32 },

    #[error("Duplicate key {key} in keyed section")]
    DuplicateKey { key: u16 },

    #[error("Missing key {key} in keyed section at offset {offset}")]
    MissingKey { key: u16, offset: usize },

    #[error("A global type registry is already installed")]
    RegistryAlreadyInstalled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ArchiveError {
    /// Shorthand for a shape mismatch with a static description of what was found
    pub(crate) fn mismatch(offset: usize, expected: &'static str, found: impl Into<String>) -> Self {
        ArchiveError::TypeMismatch {
            offset,
            expected,
            found: found.into(),
        }
    }
}

/// Type alias for Results using ArchiveError
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = ArchiveError::DanglingReference {
            identity: 7,
            offset: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("identity 7"));
        assert!(msg.contains("offset 42"));

        let err = ArchiveError::UnknownType {
            tag: TypeTag::of("shape.circle"),
            offset: Some(3),
        };
        assert!(err.to_string().contains(&TypeTag::of("shape.circle").to_string()));
    }

    #[test]
    fn test_mismatch_helper() {
        let err = ArchiveError::mismatch(9, "bool", "byte 0x07");
        match err {
            ArchiveError::TypeMismatch {
                offset,
                expected,
                found,
            } => {
                assert_eq!(offset, 9);
                assert_eq!(expected, "bool");
                assert_eq!(found, "byte 0x07");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
