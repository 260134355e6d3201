//! Block metadata - the 8-byte header word preceding every allocation
//!
//! Layout (little-endian u64 at `header_ptr`):
//! - bit 32: 1 = occupied, 0 = free
//! - bits 0..32: order (occupied) or link to the next free header (free)
//!
//! Raw words never leave this module; callers work with `Header` and `Link`.

use super::error::AllocError;
use super::order::Order;
use crate::memory::LinearMemory;

/// Every allocation is prefixed with one header word.
pub const HEADER_SIZE: u32 = 8;

const OCCUPIED_MASK: u64 = 0x0000_0001_0000_0000;

/// Raw encoding of an empty link.
const NIL_MARKER: u32 = u32::MAX;

/// Reference to the next free header of the same order.
///
/// Holds a header pointer, never an allocation pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Nil,
    Ptr(u32),
}

impl Link {
    #[inline]
    fn from_raw(raw: u32) -> Self {
        if raw == NIL_MARKER {
            Self::Nil
        } else {
            Self::Ptr(raw)
        }
    }

    #[inline]
    fn into_raw(self) -> u32 {
        match self {
            Self::Nil => NIL_MARKER,
            Self::Ptr(header_ptr) => header_ptr,
        }
    }

    #[inline]
    pub fn as_ptr(self) -> Option<u32> {
        match self {
            Self::Nil => None,
            Self::Ptr(header_ptr) => Some(header_ptr),
        }
    }
}

/// Decoded header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// Block is on the free list of its order.
    Free(Link),
    /// Block is handed out to the guest.
    Occupied(Order),
}

impl Header {
    /// Read the header at `header_ptr`.
    ///
    /// Fails if the word is out of bounds or names an order outside the
    /// size-class table.
    pub fn read_from(mem: &dyn LinearMemory, header_ptr: u32) -> Result<Self, AllocError> {
        let raw = mem.read_u64_le(header_ptr)?;
        Self::decode(raw).map_err(|reason| AllocError::corrupted(header_ptr, reason))
    }

    /// Write this header at `header_ptr`.
    pub fn write_into(self, mem: &mut dyn LinearMemory, header_ptr: u32) -> Result<(), AllocError> {
        mem.write_u64_le(header_ptr, self.encode())?;
        Ok(())
    }

    fn decode(raw: u64) -> Result<Self, String> {
        // Truncation keeps the payload and discards the discriminant word.
        let data = raw as u32;
        if raw & OCCUPIED_MASK != 0 {
            Order::from_raw(data)
                .map(Self::Occupied)
                .map_err(|err| err.to_string())
        } else {
            Ok(Self::Free(Link::from_raw(data)))
        }
    }

    fn encode(self) -> u64 {
        match self {
            Self::Occupied(order) => u64::from(order.into_raw()) | OCCUPIED_MASK,
            Self::Free(link) => u64::from(link.into_raw()),
        }
    }

    #[inline]
    pub fn into_occupied(self) -> Option<Order> {
        match self {
            Self::Occupied(order) => Some(order),
            Self::Free(_) => None,
        }
    }

    #[inline]
    pub fn into_free(self) -> Option<Link> {
        match self {
            Self::Free(link) => Some(link),
            Self::Occupied(_) => None,
        }
    }
}
