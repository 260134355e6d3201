//! Freeing-bump allocator - the primary strategy
//!
//! Every block is `HEADER_SIZE + order.size()` bytes. A free block's header
//! links to the next free block of the same order, so the free lists cost no
//! memory beyond the headers themselves.
//!
//! Metadata failures (a corrupted header, a free-list entry pointing past
//! memory, a failed header access) poison the allocator. Once poisoned it
//! rejects every call without touching memory.

use super::bump::{Bumper, ALIGNMENT};
use super::error::AllocError;
use super::free_lists::FreeLists;
use super::growth;
use super::header::{Header, Link, HEADER_SIZE};
use super::order::Order;
use super::stats::AllocationStats;
use super::{HeapAllocator, Strategy};
use crate::logging;
use crate::memory::LinearMemory;

#[derive(Debug, Clone)]
pub struct FreeingBumpAllocator {
    bumper: Bumper,
    free_lists: FreeLists,
    poisoned: bool,
    stats: AllocationStats,
}

impl FreeingBumpAllocator {
    /// Create an allocator for a heap starting at `heap_base`.
    ///
    /// `heap_base` is rounded up to 8 bytes. Everything below it belongs to
    /// the guest's static data and is never touched.
    pub fn new(heap_base: u32) -> Self {
        Self {
            bumper: Bumper::new(heap_base),
            free_lists: FreeLists::new(),
            poisoned: false,
            stats: AllocationStats::default(),
        }
    }

    #[inline]
    pub fn heap_base(&self) -> u32 {
        self.bumper.heap_base()
    }

    /// First never-carved byte of the heap.
    #[inline]
    pub fn bumper(&self) -> u32 {
        self.bumper.cursor()
    }

    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Head of the free list for `order`.
    #[inline]
    pub fn free_list_head(&self, order: Order) -> Link {
        self.free_lists.head(order)
    }

    /// Allocate at least `size` bytes and return the payload offset.
    ///
    /// Requests are rounded up to the next power of two, minimum 8 bytes.
    /// The returned offset is always 8-byte aligned.
    pub fn allocate(&mut self, mem: &mut dyn LinearMemory, size: u32) -> Result<u32, AllocError> {
        if self.poisoned {
            return Err(AllocError::PoisonedAllocator);
        }

        let result = self.allocate_inner(mem, size);
        if let Err(err) = &result {
            self.on_error(err, size);
        }
        result
    }

    fn allocate_inner(&mut self, mem: &mut dyn LinearMemory, size: u32) -> Result<u32, AllocError> {
        let order = Order::from_size(size).map_err(|_| AllocError::too_large(size))?;
        let block_size = order.size() + HEADER_SIZE;

        let (header_ptr, reused) = match self.free_lists.head(order).as_ptr() {
            Some(header_ptr) => (self.pop_free(mem, order, header_ptr)?, true),
            None => {
                let end = self.bumper.peek_end(block_size)?;
                growth::ensure_capacity(mem, end)?;
                (self.bumper.carve(block_size)?, false)
            }
        };

        Header::Occupied(order).write_into(mem, header_ptr)?;

        self.stats.record_allocation(block_size);
        self.stats.address_space_used = self.bumper.address_space_used();

        let ptr = header_ptr + HEADER_SIZE;
        logging::log_allocation(ptr, size, order.size(), reused);
        Ok(ptr)
    }

    /// Unlink the head of `order`'s free list, which sits at `header_ptr`.
    fn pop_free(&mut self, mem: &dyn LinearMemory, order: Order, header_ptr: u32) -> Result<u32, AllocError> {
        let memory_size = mem.size();
        let in_bounds = header_ptr
            .checked_add(order.size() + HEADER_SIZE)
            .is_some_and(|end| end <= memory_size);
        if !in_bounds {
            return Err(AllocError::OutOfBoundsPointer {
                header_ptr,
                memory_size,
            });
        }

        let next = Header::read_from(mem, header_ptr)?
            .into_free()
            .ok_or_else(|| AllocError::corrupted(header_ptr, "free list points to an occupied header"))?;

        self.free_lists.replace(order, next);
        Ok(header_ptr)
    }

    /// Put the block behind `ptr` back on its order's free list.
    ///
    /// The header must currently be occupied; freeing a block twice or an
    /// offset that was never handed out fails with `InvalidFree` and leaves
    /// the heap untouched.
    pub fn deallocate(&mut self, mem: &mut dyn LinearMemory, ptr: u32) -> Result<(), AllocError> {
        if self.poisoned {
            return Err(AllocError::PoisonedAllocator);
        }

        let result = self.deallocate_inner(mem, ptr);
        if let Err(err) = &result {
            self.on_error(err, 0);
        }
        result
    }

    fn deallocate_inner(&mut self, mem: &mut dyn LinearMemory, ptr: u32) -> Result<(), AllocError> {
        let header_ptr = self.header_of(ptr).ok_or(AllocError::InvalidFree { ptr })?;

        let order = match Header::read_from(mem, header_ptr)? {
            Header::Occupied(order) => order,
            Header::Free(_) => return Err(AllocError::InvalidFree { ptr }),
        };

        let block_size = order.size() + HEADER_SIZE;
        if header_ptr.checked_add(block_size).map_or(true, |end| end > self.bumper.cursor()) {
            return Err(AllocError::corrupted(
                header_ptr,
                format!("order {} runs past the bump cursor", order.into_raw()),
            ));
        }

        Header::Free(self.free_lists.head(order)).write_into(mem, header_ptr)?;
        self.free_lists.replace(order, Link::Ptr(header_ptr));

        self.stats.record_deallocation(block_size);
        logging::log_deallocation(ptr, order.size());
        Ok(())
    }

    /// Header offset of a payload pointer inside the carved heap.
    fn header_of(&self, ptr: u32) -> Option<u32> {
        let header_ptr = ptr.checked_sub(HEADER_SIZE)?;
        if !(self.heap_base()..self.bumper.cursor()).contains(&header_ptr) {
            return None;
        }
        ((header_ptr - self.heap_base()) % ALIGNMENT == 0).then_some(header_ptr)
    }

    fn on_error(&mut self, err: &AllocError, size: u32) {
        match err {
            AllocError::OutOfSpace { reason } => logging::log_out_of_space(size, reason),
            err if err.poisons() => {
                self.poisoned = true;
                logging::log_poisoned(err);
            }
            _ => {}
        }
    }
}

impl HeapAllocator for FreeingBumpAllocator {
    fn allocate(&mut self, mem: &mut dyn LinearMemory, size: u32) -> Result<u32, AllocError> {
        FreeingBumpAllocator::allocate(self, mem, size)
    }

    fn deallocate(&mut self, mem: &mut dyn LinearMemory, ptr: u32) -> Result<(), AllocError> {
        FreeingBumpAllocator::deallocate(self, mem, ptr)
    }

    fn stats(&self) -> AllocationStats {
        self.stats
    }

    fn strategy(&self) -> Strategy {
        Strategy::FreeingBump
    }
}
