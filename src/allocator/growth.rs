//! Arena growth - page acquisition from linear memory
//!
//! Design: Geometric doubling of the arena, capped at the wasm32 page
//! ceiling, never less than what the request needs. Keeps the number of
//! `memory.grow` calls logarithmic in the final heap size.

use tracing::debug;

use super::error::AllocError;
use crate::memory::{LinearMemory, MAX_WASM_PAGES, PAGE_SIZE};

/// Number of pages needed to hold `size` bytes.
///
/// Returns `None` when rounding up would overflow `u32`.
pub fn pages_from_size(size: u32) -> Option<u32> {
    size.checked_add(PAGE_SIZE - 1).map(|rounded| rounded / PAGE_SIZE)
}

/// Page count to grow to when `current_pages` cannot hold `required_pages`.
#[inline]
pub fn next_page_target(current_pages: u32, required_pages: u32) -> u32 {
    current_pages
        .saturating_mul(2)
        .min(MAX_WASM_PAGES)
        .max(required_pages)
}

/// Make sure `mem` spans at least `required_end` bytes, growing if needed.
///
/// # Panics
/// If the memory reports a successful grow but its size is not the
/// requested page count. Bookkeeping cannot continue against a substrate
/// that misreports its size.
pub fn ensure_capacity(mem: &mut dyn LinearMemory, required_end: u32) -> Result<(), AllocError> {
    let size = mem.size();
    if required_end <= size {
        return Ok(());
    }

    let required_pages = pages_from_size(required_end)
        .ok_or_else(|| AllocError::out_of_space(format!("{required_end} bytes do not fit into u32 pages")))?;
    let current_pages = mem.pages();

    if current_pages >= MAX_WASM_PAGES {
        return Err(AllocError::out_of_space(format!(
            "current pages {current_pages} already at max wasm pages {MAX_WASM_PAGES}"
        )));
    }
    if required_pages > MAX_WASM_PAGES {
        return Err(AllocError::out_of_space(format!(
            "required pages {required_pages} exceed max wasm pages {MAX_WASM_PAGES}"
        )));
    }

    let target_pages = next_page_target(current_pages, required_pages);
    debug!(
        target: "wasm_heap::growth",
        current_pages,
        required_pages,
        target_pages,
        "growing linear memory"
    );

    if mem.grow(target_pages - current_pages).is_none() {
        return Err(AllocError::out_of_space(format!(
            "failed to grow from {current_pages} pages to {target_pages} pages"
        )));
    }

    let grown_pages = mem.pages();
    assert_eq!(
        grown_pages, target_pages,
        "linear memory reported growth from {current_pages} to {target_pages} pages but holds {grown_pages}"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::VecMemory;

    #[test]
    fn pages_round_up() {
        assert_eq!(pages_from_size(0), Some(0));
        assert_eq!(pages_from_size(1), Some(1));
        assert_eq!(pages_from_size(PAGE_SIZE), Some(1));
        assert_eq!(pages_from_size(PAGE_SIZE + 1), Some(2));
    }

    #[test]
    fn pages_near_u32_max_overflow() {
        assert_eq!(pages_from_size(u32::MAX - (PAGE_SIZE - 1)), Some(65535));
        assert_eq!(pages_from_size(u32::MAX - (PAGE_SIZE - 2)), None);
        assert_eq!(pages_from_size(u32::MAX), None);
    }

    #[test]
    fn target_doubles_current_pages() {
        assert_eq!(next_page_target(4, 5), 8);
    }

    #[test]
    fn target_never_below_required() {
        assert_eq!(next_page_target(4, 20), 20);
    }

    #[test]
    fn target_capped_at_ceiling() {
        assert_eq!(next_page_target(40_000, 40_001), MAX_WASM_PAGES);
    }

    #[test]
    fn no_growth_when_capacity_suffices() {
        let mut mem = VecMemory::with_pages(1);
        ensure_capacity(&mut mem, PAGE_SIZE).expect("fits");
        assert_eq!(mem.pages(), 1);
    }

    #[test]
    fn grows_geometrically() {
        let mut mem = VecMemory::with_pages(4);
        ensure_capacity(&mut mem, 4 * PAGE_SIZE + 1).expect("grow");
        assert_eq!(mem.pages(), 8);
    }

    #[test]
    fn grows_from_empty_memory() {
        let mut mem = VecMemory::with_pages(0);
        ensure_capacity(&mut mem, 16).expect("grow");
        assert_eq!(mem.pages(), 1);
    }

    #[test]
    fn memory_ceiling_reports_out_of_space() {
        let mut mem = VecMemory::new(1, Some(1)).expect("memory");
        let err = ensure_capacity(&mut mem, PAGE_SIZE + 8).unwrap_err();
        assert!(matches!(err, AllocError::OutOfSpace { .. }));
        assert_eq!(mem.pages(), 1);
    }

    #[test]
    fn oversized_offset_reports_out_of_space() {
        let mut mem = VecMemory::with_pages(1);
        let err = ensure_capacity(&mut mem, u32::MAX).unwrap_err();
        assert!(matches!(err, AllocError::OutOfSpace { .. }));
    }

    /// Memory that claims every grow succeeded without resizing.
    struct LyingMemory(VecMemory);

    impl LinearMemory for LyingMemory {
        fn size(&self) -> u32 {
            self.0.size()
        }
        fn pages(&self) -> u32 {
            self.0.pages()
        }
        fn grow(&mut self, _delta_pages: u32) -> Option<u32> {
            Some(self.0.size())
        }
        fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), crate::memory::OutOfBounds> {
            self.0.read(offset, buf)
        }
        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), crate::memory::OutOfBounds> {
            self.0.write(offset, bytes)
        }
    }

    #[test]
    #[should_panic(expected = "reported growth")]
    fn misreported_growth_aborts() {
        let mut mem = LyingMemory(VecMemory::with_pages(1));
        let _ = ensure_capacity(&mut mem, 2 * PAGE_SIZE);
    }

    /// Page-counted memory that stores only the bytes actually written.
    struct SparseMemory {
        pages: u32,
        bytes: std::collections::HashMap<u32, u8>,
    }

    impl SparseMemory {
        fn with_pages(pages: u32) -> Self {
            Self {
                pages,
                bytes: std::collections::HashMap::new(),
            }
        }
    }

    impl LinearMemory for SparseMemory {
        fn size(&self) -> u32 {
            u32::try_from(u64::from(self.pages) * u64::from(PAGE_SIZE)).unwrap_or(u32::MAX)
        }
        fn pages(&self) -> u32 {
            self.pages
        }
        fn grow(&mut self, delta_pages: u32) -> Option<u32> {
            let target = self.pages.checked_add(delta_pages).filter(|&p| p <= MAX_WASM_PAGES)?;
            self.pages = target;
            Some(self.size())
        }
        fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), crate::memory::OutOfBounds> {
            let range = crate::memory::checked_range(offset, buf.len(), self.size())?;
            for (slot, addr) in buf.iter_mut().zip(range) {
                *slot = self.bytes.get(&(addr as u32)).copied().unwrap_or(0);
            }
            Ok(())
        }
        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), crate::memory::OutOfBounds> {
            let range = crate::memory::checked_range(offset, bytes.len(), self.size())?;
            for (&byte, addr) in bytes.iter().zip(range) {
                self.bytes.insert(addr as u32, byte);
            }
            Ok(())
        }
    }

    #[test]
    fn growth_to_page_ceiling_counts_pages_exactly() {
        let mut mem = SparseMemory::with_pages(40_000);
        ensure_capacity(&mut mem, 40_000 * PAGE_SIZE + 8).expect("grow");
        assert_eq!(mem.pages(), MAX_WASM_PAGES);
        assert_eq!(mem.size(), u32::MAX);
    }

    #[test]
    fn small_allocation_near_ceiling_grows_to_full_memory() {
        let mut mem = SparseMemory::with_pages(40_000);
        let mut heap = crate::allocator::FreeingBumpAllocator::new(40_000 * PAGE_SIZE - 8);

        let ptr = heap.allocate(&mut mem, 1).expect("alloc");

        assert_eq!(ptr, 40_000 * PAGE_SIZE);
        assert_eq!(mem.pages(), MAX_WASM_PAGES);
        assert!(!heap.is_poisoned());
    }

    #[test]
    fn cursor_overflow_at_full_memory_reports_out_of_space() {
        let mut mem = SparseMemory::with_pages(MAX_WASM_PAGES);
        let mut heap = crate::allocator::FreeingBumpAllocator::new(u32::MAX - 16);
        assert!(matches!(heap.allocate(&mut mem, 64), Err(AllocError::OutOfSpace { .. })));
    }

}
