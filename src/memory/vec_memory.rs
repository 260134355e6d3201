//! In-process linear memory backed by a `Vec<u8>`
//!
//! Mirrors wasm `memory.grow` semantics: growth is page-granular, new pages
//! are zeroed, and growth past the configured ceiling fails without side
//! effects.

use super::{checked_range, LinearMemory, OutOfBounds, MAX_WASM_PAGES, PAGE_SIZE};

/// Heap-allocated linear memory with a page ceiling.
#[derive(Debug, Clone)]
pub struct VecMemory {
    bytes: Vec<u8>,
    max_pages: u32,
}

impl VecMemory {
    /// Create a memory with `initial_pages` zeroed pages.
    ///
    /// `max_pages` is clamped to [`MAX_WASM_PAGES`]; `None` means the wasm32
    /// ceiling. Returns `None` if `initial_pages` exceeds the ceiling.
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Option<Self> {
        let max_pages = max_pages.unwrap_or(MAX_WASM_PAGES).min(MAX_WASM_PAGES);
        if initial_pages > max_pages {
            return None;
        }
        Some(Self {
            bytes: vec![0; pages_to_bytes(initial_pages)],
            max_pages,
        })
    }

    /// Memory with `initial_pages` pages that may grow to the wasm32 ceiling.
    pub fn with_pages(initial_pages: u32) -> Self {
        Self {
            bytes: vec![0; pages_to_bytes(initial_pages.min(MAX_WASM_PAGES))],
            max_pages: MAX_WASM_PAGES,
        }
    }

    #[inline]
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Raw view of the whole arena.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable view of the whole arena, for simulating out-of-band writes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

#[inline]
fn pages_to_bytes(pages: u32) -> usize {
    pages as usize * PAGE_SIZE as usize
}

impl LinearMemory for VecMemory {
    #[inline]
    fn size(&self) -> u32 {
        u32::try_from(self.bytes.len()).unwrap_or(u32::MAX)
    }

    #[inline]
    fn pages(&self) -> u32 {
        // At most MAX_WASM_PAGES, always fits.
        (self.bytes.len() / PAGE_SIZE as usize) as u32
    }

    fn grow(&mut self, delta_pages: u32) -> Option<u32> {
        let target = self.pages().checked_add(delta_pages)?;
        if target > self.max_pages {
            return None;
        }
        self.bytes.resize(pages_to_bytes(target), 0);
        Some(self.size())
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), OutOfBounds> {
        let range = checked_range(offset, buf.len(), self.size())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), OutOfBounds> {
        let range = checked_range(offset, bytes.len(), self.size())?;
        self.bytes[range].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed_with_requested_pages() {
        let mem = VecMemory::new(2, None).expect("memory");
        assert_eq!(mem.size(), 2 * PAGE_SIZE);
        assert_eq!(mem.pages(), 2);
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn initial_pages_above_ceiling_rejected() {
        assert!(VecMemory::new(5, Some(4)).is_none());
    }

    #[test]
    fn grow_respects_ceiling() {
        let mut mem = VecMemory::new(1, Some(3)).expect("memory");
        assert_eq!(mem.grow(2), Some(3 * PAGE_SIZE));
        assert_eq!(mem.grow(1), None);
        assert_eq!(mem.size(), 3 * PAGE_SIZE);
    }

    #[test]
    fn little_endian_round_trip() {
        let mut mem = VecMemory::with_pages(1);
        mem.write_u64_le(16, 0x0102_0304_0506_0708).expect("write");
        assert_eq!(mem.read_u8(16), Ok(0x08));
        assert_eq!(mem.read_u32_le(20), Ok(0x0102_0304));
        assert_eq!(mem.read_u64_le(16), Ok(0x0102_0304_0506_0708));
    }

    #[test]
    fn access_past_end_fails() {
        let mut mem = VecMemory::with_pages(1);
        let err = mem.read_u64_le(PAGE_SIZE - 4).unwrap_err();
        assert_eq!(err.offset, PAGE_SIZE - 4);
        assert_eq!(err.len, 8);
        assert!(mem.write_u32_le(PAGE_SIZE, 1).is_err());
        assert!(mem.write_u32_le(PAGE_SIZE - 4, 1).is_ok());
    }

    #[test]
    fn zero_page_memory_rejects_every_access() {
        let mem = VecMemory::with_pages(0);
        assert_eq!(mem.size(), 0);
        assert!(mem.read_u8(0).is_err());
    }
}
