//! Legacy bump/free-list allocator
//!
//! Same external contract as [`super::FreeingBumpAllocator`], simpler
//! bookkeeping:
//! - the header is one order byte followed by seven fill bytes (`0xFF` while
//!   the block is live, `0x00` once it is freed)
//! - a free block keeps its free-list link in the first 4 bytes of its
//!   payload, not in the header
//! - growth asks for exactly the missing pages plus one, no doubling
//!
//! There is no poisoned state; every failure is reported and the allocator
//! stays usable.

use super::bump::{Bumper, ALIGNMENT};
use super::error::AllocError;
use super::header::HEADER_SIZE;
use super::order::{Order, NUM_ORDERS};
use super::stats::AllocationStats;
use super::{HeapAllocator, Strategy};
use crate::logging;
use crate::memory::{LinearMemory, PAGE_SIZE};

const OCCUPIED_FILL: u8 = 0xFF;
const FREE_FILL: u8 = 0x00;

/// Raw encoding of an empty payload link.
const NIL_LINK: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct LegacyAllocator {
    bumper: Bumper,
    heads: [Option<u32>; NUM_ORDERS],
    stats: AllocationStats,
}

impl LegacyAllocator {
    /// Create an allocator for a heap starting at `heap_base`.
    ///
    /// Grows `mem` when it does not yet reach past the aligned heap base.
    pub fn new(mem: &mut dyn LinearMemory, heap_base: u32) -> Result<Self, AllocError> {
        let bumper = Bumper::new(heap_base);
        let size = mem.size();
        if size <= bumper.heap_base() {
            let pages = (bumper.heap_base() - size) / PAGE_SIZE + 1;
            mem.grow(pages).ok_or_else(|| {
                AllocError::out_of_space(format!("heap base {} exceeds max memory definition", bumper.heap_base()))
            })?;
        }

        Ok(Self {
            bumper,
            heads: [None; NUM_ORDERS],
            stats: AllocationStats::default(),
        })
    }

    #[inline]
    pub fn heap_base(&self) -> u32 {
        self.bumper.heap_base()
    }

    #[inline]
    pub fn bumper(&self) -> u32 {
        self.bumper.cursor()
    }

    /// Header offset at the head of `order`'s free list.
    #[inline]
    pub fn free_list_head(&self, order: Order) -> Option<u32> {
        self.heads[order.index()]
    }

    pub fn allocate(&mut self, mem: &mut dyn LinearMemory, size: u32) -> Result<u32, AllocError> {
        let result = self.allocate_inner(mem, size);
        if let Err(AllocError::OutOfSpace { reason }) = &result {
            logging::log_out_of_space(size, reason);
        }
        result
    }

    fn allocate_inner(&mut self, mem: &mut dyn LinearMemory, size: u32) -> Result<u32, AllocError> {
        let order = Order::from_size(size).map_err(|_| AllocError::too_large(size))?;
        let block_size = order.size() + HEADER_SIZE;

        let (header_ptr, reused) = match self.heads[order.index()] {
            Some(header_ptr) => (self.pop_free(mem, order, header_ptr)?, true),
            None => {
                let end = self.bumper.peek_end(block_size)?;
                grow_to(mem, end)?;
                (self.bumper.carve(block_size)?, false)
            }
        };

        mem.write_u64_le(header_ptr, encode(order, OCCUPIED_FILL))?;

        self.stats.record_allocation(block_size);
        self.stats.address_space_used = self.bumper.address_space_used();

        let ptr = header_ptr + HEADER_SIZE;
        logging::log_allocation(ptr, size, order.size(), reused);
        Ok(ptr)
    }

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

        let (stored, fill) = decode(header_ptr, mem.read_u64_le(header_ptr)?)?;
        if stored != order || fill != FREE_FILL {
            return Err(AllocError::corrupted(header_ptr, "free list entry is not a free block of this order"));
        }

        let link = mem.read_u32_le(header_ptr + HEADER_SIZE)?;
        self.heads[order.index()] = (link != NIL_LINK).then_some(link);
        Ok(header_ptr)
    }

    pub fn deallocate(&mut self, mem: &mut dyn LinearMemory, ptr: u32) -> Result<(), AllocError> {
        let header_ptr = ptr
            .checked_sub(HEADER_SIZE)
            .filter(|hp| (self.heap_base()..self.bumper.cursor()).contains(hp))
            .filter(|hp| (hp - self.heap_base()) % ALIGNMENT == 0)
            .ok_or(AllocError::InvalidFree { ptr })?;

        let (order, fill) = decode(header_ptr, mem.read_u64_le(header_ptr)?)?;
        if fill != OCCUPIED_FILL {
            return Err(AllocError::InvalidFree { ptr });
        }

        let link = self.heads[order.index()].unwrap_or(NIL_LINK);
        mem.write_u32_le(ptr, link)?;
        mem.write_u64_le(header_ptr, encode(order, FREE_FILL))?;
        self.heads[order.index()] = Some(header_ptr);

        let block_size = order.size() + HEADER_SIZE;
        self.stats.record_deallocation(block_size);
        logging::log_deallocation(ptr, order.size());
        Ok(())
    }
}

/// Grow so that `end` is mapped: the missing pages plus one.
fn grow_to(mem: &mut dyn LinearMemory, end: u32) -> Result<(), AllocError> {
    let size = mem.size();
    if end <= size {
        return Ok(());
    }

    let pages = (end - size) / PAGE_SIZE + 1;
    mem.grow(pages)
        .map(|_| ())
        .ok_or_else(|| AllocError::out_of_space(format!("failed to grow heap by {pages} pages")))
}

fn encode(order: Order, fill: u8) -> u64 {
    let mut bytes = [fill; 8];
    // Orders are < 23, so the index always fits the tag byte.
    bytes[0] = order.into_raw() as u8;
    u64::from_le_bytes(bytes)
}

fn decode(header_ptr: u32, raw: u64) -> Result<(Order, u8), AllocError> {
    let bytes = raw.to_le_bytes();
    let fill = bytes[1];
    if bytes[1..].iter().any(|&b| b != fill) || (fill != OCCUPIED_FILL && fill != FREE_FILL) {
        return Err(AllocError::corrupted(header_ptr, "header fill pattern damaged"));
    }
    let order = Order::from_raw(u32::from(bytes[0])).map_err(|err| AllocError::corrupted(header_ptr, err.to_string()))?;
    Ok((order, fill))
}

impl HeapAllocator for LegacyAllocator {
    fn allocate(&mut self, mem: &mut dyn LinearMemory, size: u32) -> Result<u32, AllocError> {
        LegacyAllocator::allocate(self, mem, size)
    }

    fn deallocate(&mut self, mem: &mut dyn LinearMemory, ptr: u32) -> Result<(), AllocError> {
        LegacyAllocator::deallocate(self, mem, ptr)
    }

    fn stats(&self) -> AllocationStats {
        self.stats
    }

    fn strategy(&self) -> Strategy {
        Strategy::Legacy
    }
}
