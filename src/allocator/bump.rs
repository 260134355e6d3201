//! Bump cursor - carves fresh blocks off the end of the heap
//!
//! The cursor only moves forward. Blocks popped from a free list never
//! touch it, so `cursor - heap_base` is the address space ever carved.

use super::error::AllocError;

/// Heap start must be 8-byte aligned so every header and payload is too.
pub const ALIGNMENT: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bumper {
    heap_base: u32,
    cursor: u32,
}

impl Bumper {
    /// Start carving at `heap_base` rounded up to [`ALIGNMENT`].
    pub fn new(heap_base: u32) -> Self {
        let heap_base = align_up(heap_base);
        Self {
            heap_base,
            cursor: heap_base,
        }
    }

    #[inline]
    pub fn heap_base(&self) -> u32 {
        self.heap_base
    }

    /// First never-carved byte.
    #[inline]
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// End offset of a `len`-byte carve, without moving the cursor.
    #[inline]
    pub fn peek_end(&self, len: u32) -> Result<u32, AllocError> {
        self.cursor
            .checked_add(len)
            .ok_or_else(|| AllocError::out_of_space("bump cursor would overflow u32"))
    }

    /// Carve `len` bytes and return the start of the carved block.
    #[inline]
    pub fn carve(&mut self, len: u32) -> Result<u32, AllocError> {
        let start = self.cursor;
        self.cursor = self.peek_end(len)?;
        Ok(start)
    }

    #[inline]
    pub fn address_space_used(&self) -> u32 {
        self.cursor - self.heap_base
    }
}

/// Round `offset` up to the next multiple of [`ALIGNMENT`], saturating at
/// the last aligned `u32`.
#[inline]
pub const fn align_up(offset: u32) -> u32 {
    match offset.checked_add(ALIGNMENT - 1) {
        Some(rounded) => rounded & !(ALIGNMENT - 1),
        None => u32::MAX & !(ALIGNMENT - 1),
    }
}
