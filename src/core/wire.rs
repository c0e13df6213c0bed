//! # Wire Layout
//!
//! ```text
//! [ Body Region: root value and all first-occurrence object bodies ]
//! [ Reference Table: one row per identity = (identity: u32, offset: u32) ]
//! [ Trailer: table_len: u32, row_count: u32, magic: "GARC" ]
//! ```
//!
//! Object slots are `0x00` (null), `0x01 identity:u32 body_len:u32 fields` (first occurrence)
//! or `0x02 identity:u32` (reference). A row's offset is the position of `body_len`.
//! All multi-byte fields are little-endian.

use crate::config::WIRE_MAGIC;
use crate::core::endian::FixedWidth;
use crate::error::{constants, ArchiveError, Result};

/// Empty object slot
pub const MARKER_NULL: u8 = 0x00;
/// First occurrence: identity and body follow
pub const MARKER_BODY: u8 = 0x01;
/// Later occurrence: identity follows
pub const MARKER_REF: u8 = 0x02;

/// Encoded size of one reference-table row
pub const ROW_SIZE: usize = 8;
/// Encoded size of the trailer
pub const TRAILER_SIZE: usize = 12;

/// One reference-table row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRow {
    pub identity: u32,
    pub offset: u32,
}

impl TableRow {
    /// Append the encoded row
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.identity.to_wire());
        out.extend_from_slice(&self.offset.to_wire());
    }

    fn decode(bytes: &[u8]) -> TableRow {
        let mut identity = [0u8; 4];
        let mut offset = [0u8; 4];
        identity.copy_from_slice(&bytes[..4]);
        offset.copy_from_slice(&bytes[4..8]);
        TableRow {
            identity: u32::from_wire(identity),
            offset: u32::from_wire(offset),
        }
    }
}

/// Fixed-size record at the very end of every archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub table_len: u32,
    pub row_count: u32,
}

impl Trailer {
    /// Append the encoded trailer, end marker included
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.table_len.to_wire());
        out.extend_from_slice(&self.row_count.to_wire());
        out.extend_from_slice(&WIRE_MAGIC);
    }

    /// Read the trailer from the tail of a finished buffer
    pub fn parse(buffer: &[u8]) -> Result<Trailer> {
        let len = buffer.len();
        if len < TRAILER_SIZE {
            return Err(ArchiveError::TruncatedStream {
                offset: 0,
                needed: TRAILER_SIZE,
                available: len,
            });
        }
        // A missing end marker means the tail of the buffer was cut off.
        if buffer[len - 4..] != WIRE_MAGIC {
            return Err(ArchiveError::TruncatedStream {
                offset: len,
                needed: WIRE_MAGIC.len(),
                available: 0,
            });
        }

        let at = len - TRAILER_SIZE;
        let mut table_len = [0u8; 4];
        let mut row_count = [0u8; 4];
        table_len.copy_from_slice(&buffer[at..at + 4]);
        row_count.copy_from_slice(&buffer[at + 4..at + 8]);
        let trailer = Trailer {
            table_len: u32::from_wire(table_len),
            row_count: u32::from_wire(row_count),
        };

        if trailer.table_len as u64 != trailer.row_count as u64 * ROW_SIZE as u64 {
            return Err(ArchiveError::MalformedTrailer {
                reason: constants::ERR_TABLE_LENGTH,
                buffer_len: len,
            });
        }
        if trailer.table_len as usize > at {
            return Err(ArchiveError::MalformedTrailer {
                reason: constants::ERR_TABLE_OVERRUN,
                buffer_len: len,
            });
        }
        Ok(trailer)
    }

    /// Length of the body region in a buffer ending with this trailer
    pub fn body_len(&self, buffer_len: usize) -> usize {
        buffer_len - TRAILER_SIZE - self.table_len as usize
    }
}

/// Load and validate the reference table: offsets indexed by identity
pub fn load_table(buffer: &[u8], trailer: &Trailer) -> Result<Vec<u32>> {
    let body_len = trailer.body_len(buffer.len());
    let table = &buffer[body_len..body_len + trailer.table_len as usize];
    let mut offsets = Vec::with_capacity(trailer.row_count as usize);

    for (index, chunk) in table.chunks_exact(ROW_SIZE).enumerate() {
        let row = TableRow::decode(chunk);
        if row.identity as usize != index {
            return Err(ArchiveError::MalformedTrailer {
                reason: constants::ERR_ROW_ORDER,
                buffer_len: buffer.len(),
            });
        }
        // The row must leave room for the body length field itself.
        if row.offset as usize + 4 > body_len {
            return Err(ArchiveError::MalformedTrailer {
                reason: constants::ERR_ROW_OFFSET,
                buffer_len: buffer.len(),
            });
        }
        offsets.push(row.offset);
    }
    Ok(offsets)
}
