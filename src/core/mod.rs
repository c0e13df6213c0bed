//! # Core Archive Components
//!
//! The encode/decode engine: identity tracking, the type registry, wire layout, and the value
//! codecs built on top of them.
//!
//! ## Components
//! - **Endian**: fixed-width byte-order normalization
//! - **Tag / Registry**: stable type tags and the factories behind them
//! - **Writer / Sub-Archive**: encoding with deduplicated shared instances
//! - **Reader**: two-pass decoding with forward references and cycles
//! - **Value / Keyed**: the value shapes and keyed sections
//!
//! ## Wire Format
//! ```text
//! [Body Region(N)] [Reference Table(8 * rows)] [TableLen(4)] [RowCount(4)] [Magic "GARC"]
//! ```
//!
//! ## Security
//! - Maximum archive size: 4 GiB (offsets are `u32`), lower limits via config
//! - The trailer and every table row are validated before the first body is read
//! - Length prefixes are checked against the enclosing region before use

pub mod endian;
pub mod keyed;
pub mod object;
pub mod reader;
pub mod registry;
pub mod sink;
pub mod sub_archive;
pub mod tag;
pub mod value;
pub mod wire;
pub mod writer;

use crate::error::{constants, ArchiveError, Result};
use bytes::Bytes;
use reader::ArchiveReader;
use registry::TypeRegistry;
use std::sync::Arc;
use value::ArchiveValue;
use writer::ArchiveWriter;

/// Encode `value` as the root of a fresh archive
pub fn encode<V: ArchiveValue>(registry: &Arc<TypeRegistry>, value: &V) -> Result<Bytes> {
    let mut writer = ArchiveWriter::new(registry.clone());
    value.write_to(&mut writer)?;
    writer.finalize()
}

/// Decode the root value of an archive; the whole body region must be consumed
pub fn decode<V: ArchiveValue>(registry: &Arc<TypeRegistry>, bytes: impl Into<Bytes>) -> Result<V> {
    let mut reader = ArchiveReader::open(bytes, registry.clone())?;
    let value = V::read_from(&mut reader)?;
    if reader.remaining() != 0 {
        return Err(ArchiveError::mismatch(
            reader.position(),
            "end of archive",
            format!(
                "{} ({} bytes)",
                constants::ERR_TRAILING_BYTES,
                reader.remaining()
            ),
        ));
    }
    Ok(value)
}
