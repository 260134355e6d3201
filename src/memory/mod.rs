//! Linear memory capability - the byte arena the allocator manages
//!
//! Design: The allocator never owns guest memory. It borrows a
//! `LinearMemory` for the duration of a single call and treats every access
//! as fallible, since the arena can be grown or written by other importers
//! between calls.

mod vec_memory;

pub use vec_memory::VecMemory;

use std::fmt;

/// Size of a wasm page in bytes. All growth is quantized to this unit.
pub const PAGE_SIZE: u32 = 65536;

/// Page ceiling of a wasm32 address space (4 GiB / 64 KiB).
pub const MAX_WASM_PAGES: u32 = (4u64 * 1024 * 1024 * 1024 / PAGE_SIZE as u64) as u32;

/// A bounds-checked access fell outside the current memory size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub offset: u32,
    pub len: u32,
    pub size: u32,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access of {} bytes at offset {} exceeds memory size {}",
            self.len, self.offset, self.size
        )
    }
}

impl std::error::Error for OutOfBounds {}

/// Growable, byte-addressable region backing a guest module instance.
///
/// Implementors only provide raw byte access plus size/grow; the fixed-width
/// little-endian helpers are built on top of `read`/`write`.
pub trait LinearMemory {
    /// Current size in bytes.
    ///
    /// A full wasm32 memory holds exactly 2^32 bytes, which saturates to
    /// `u32::MAX`. Use [`pages`](Self::pages) for exact accounting.
    fn size(&self) -> u32;

    /// Current size in whole pages.
    fn pages(&self) -> u32;

    /// Grow by `delta_pages` pages.
    ///
    /// Returns the new size in bytes, or `None` if the memory cannot grow
    /// that far (its page ceiling would be exceeded).
    fn grow(&mut self, delta_pages: u32) -> Option<u32>;

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), OutOfBounds>;

    /// Copy `bytes` into memory starting at `offset`.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), OutOfBounds>;

    #[inline]
    fn read_u8(&self, offset: u32) -> Result<u8, OutOfBounds> {
        let mut buf = [0u8; 1];
        self.read(offset, &mut buf)?;
        Ok(buf[0])
    }

    #[inline]
    fn write_u8(&mut self, offset: u32, value: u8) -> Result<(), OutOfBounds> {
        self.write(offset, &[value])
    }

    #[inline]
    fn read_u32_le(&self, offset: u32) -> Result<u32, OutOfBounds> {
        let mut buf = [0u8; 4];
        self.read(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    #[inline]
    fn write_u32_le(&mut self, offset: u32, value: u32) -> Result<(), OutOfBounds> {
        self.write(offset, &value.to_le_bytes())
    }

    #[inline]
    fn read_u64_le(&self, offset: u32) -> Result<u64, OutOfBounds> {
        let mut buf = [0u8; 8];
        self.read(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    #[inline]
    fn write_u64_le(&mut self, offset: u32, value: u64) -> Result<(), OutOfBounds> {
        self.write(offset, &value.to_le_bytes())
    }
}

/// Resolve `offset..offset + len` against `size`, rejecting ranges that
/// wrap the 32-bit address space or run past the end.
#[inline]
pub(crate) fn checked_range(offset: u32, len: usize, size: u32) -> Result<std::ops::Range<usize>, OutOfBounds> {
    let err = OutOfBounds {
        offset,
        len: u32::try_from(len).unwrap_or(u32::MAX),
        size,
    };
    let len = u32::try_from(len).map_err(|_| err)?;
    let end = offset.checked_add(len).ok_or(err)?;
    if end > size {
        return Err(err);
    }
    Ok(offset as usize..end as usize)
}
