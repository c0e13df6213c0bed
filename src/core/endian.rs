//! # Endian Normalizer
//!
//! Fixed-width byte-order conversion used by every other component.
//!
//! The wire format is little-endian (efficient on the common platforms). Encoding converts
//! host-order values to wire order before writing; decoding converts wire order back to host
//! order after reading. The host order is detected once per process and cached.
//!
//! ## Usage
//! ```rust
//! use graph_archive::core::endian::{FixedWidth, ByteOrder};
//!
//! let wire = 300u16.to_wire();
//! assert_eq!(wire, [0x2C, 0x01]);
//! assert_eq!(u16::from_wire(wire), 300);
//!
//! // A big-endian host holds 300 as [0x01, 0x2C]; normalizing yields the same wire bytes.
//! let mut host = 300u16.to_be_bytes();
//! ByteOrder::Big.to_wire_bytes(&mut host);
//! assert_eq!(host, wire);
//! ```

use once_cell::sync::Lazy;

/// Multi-byte field order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// The one canonical order used on the wire
pub const WIRE_ORDER: ByteOrder = ByteOrder::Little;

static NATIVE_ORDER: Lazy<ByteOrder> = Lazy::new(|| {
    if u16::from_ne_bytes([1, 0]) == 1 {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    }
});

/// Byte order of the running host (detected once, then cached)
pub fn native() -> ByteOrder {
    *NATIVE_ORDER
}

/// Reverse the bytes of a 16-bit value
#[inline]
pub fn swap16(value: u16) -> u16 {
    value.swap_bytes()
}

/// Reverse the bytes of a 32-bit value
#[inline]
pub fn swap32(value: u32) -> u32 {
    value.swap_bytes()
}

/// Reverse the bytes of a 64-bit value
#[inline]
pub fn swap64(value: u64) -> u64 {
    value.swap_bytes()
}

impl ByteOrder {
    /// Convert bytes held in this host order into wire order, in place.
    ///
    /// Works on any fixed-width field; a no-op when this order already is the wire order.
    pub fn to_wire_bytes(self, bytes: &mut [u8]) {
        if self != WIRE_ORDER {
            bytes.reverse();
        }
    }

    /// Convert wire-order bytes into this host order, in place
    pub fn from_wire_bytes(self, bytes: &mut [u8]) {
        // Reversal is its own inverse.
        self.to_wire_bytes(bytes);
    }
}

/// Fixed-width values that can be normalized to and from wire order
pub trait FixedWidth: Copy {
    /// Encoded width in bytes
    const WIDTH: usize;

    /// Wire-order byte array for this type
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default + Copy;

    /// Reverse the byte order of the value
    fn swap(self) -> Self;

    /// Host-order bytes of the value
    fn to_host_bytes(self) -> Self::Bytes;

    /// Value from host-order bytes
    fn from_host_bytes(bytes: Self::Bytes) -> Self;

    /// Convert to canonical wire bytes on the running host
    #[inline]
    fn to_wire(self) -> Self::Bytes {
        let value = if native() == WIRE_ORDER {
            self
        } else {
            self.swap()
        };
        value.to_host_bytes()
    }

    /// Convert canonical wire bytes to a value on the running host
    #[inline]
    fn from_wire(bytes: Self::Bytes) -> Self {
        let value = Self::from_host_bytes(bytes);
        if native() == WIRE_ORDER {
            value
        } else {
            value.swap()
        }
    }
}

macro_rules! impl_fixed_width_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FixedWidth for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                #[inline]
                fn swap(self) -> Self {
                    self.swap_bytes()
                }

                #[inline]
                fn to_host_bytes(self) -> Self::Bytes {
                    self.to_ne_bytes()
                }

                #[inline]
                fn from_host_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_ne_bytes(bytes)
                }
            }
        )*
    };
}

impl_fixed_width_int!(u8, u16, u32, u64, i8, i16, i32, i64);

impl FixedWidth for f32 {
    const WIDTH: usize = 4;
    type Bytes = [u8; 4];

    #[inline]
    fn swap(self) -> Self {
        f32::from_bits(swap32(self.to_bits()))
    }

    #[inline]
    fn to_host_bytes(self) -> Self::Bytes {
        self.to_ne_bytes()
    }

    #[inline]
    fn from_host_bytes(bytes: Self::Bytes) -> Self {
        f32::from_ne_bytes(bytes)
    }
}

impl FixedWidth for f64 {
    const WIDTH: usize = 8;
    type Bytes = [u8; 8];

    #[inline]
    fn swap(self) -> Self {
        f64::from_bits(swap64(self.to_bits()))
    }

    #[inline]
    fn to_host_bytes(self) -> Self::Bytes {
        self.to_ne_bytes()
    }

    #[inline]
    fn from_host_bytes(bytes: Self::Bytes) -> Self {
        f64::from_ne_bytes(bytes)
    }
}
