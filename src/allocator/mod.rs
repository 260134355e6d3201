//! Heap allocator for guest linear memory
//!
//! Design: Freeing-bump allocation over power-of-two size classes:
//! 1. Size class lookup (`order`)
//! 2. Pop from the per-order free list when possible (`free_lists`, `header`)
//! 3. Otherwise carve from the bump cursor (`bump`), growing memory
//!    geometrically when the arena is too small (`growth`)
//!
//! Two strategies implement [`HeapAllocator`]: the primary
//! [`FreeingBumpAllocator`] and the older [`LegacyAllocator`]. The strategy is
//! picked once, when the allocator is built.

mod bump;
mod error;
mod free_lists;
mod freeing_bump;
mod growth;
mod header;
mod legacy;
mod order;
mod stats;


pub use bump::{align_up, Bumper, ALIGNMENT};
pub use error::{AllocError, OrderError};
pub use free_lists::FreeLists;
pub use freeing_bump::FreeingBumpAllocator;
pub use growth::{ensure_capacity, next_page_target, pages_from_size};
pub use header::{Header, Link, HEADER_SIZE};
pub use legacy::LegacyAllocator;
pub use order::{Order, MAX_POSSIBLE_ALLOCATION, MIN_POSSIBLE_ALLOCATION, NUM_ORDERS};
pub use stats::AllocationStats;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::memory::LinearMemory;

/// Allocation strategy, fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    FreeingBump,
    Legacy,
}

impl Strategy {
    /// Build an allocator of this strategy for a heap starting at `heap_base`.
    ///
    /// The legacy strategy may grow `mem` so that the heap base is mapped.
    pub fn build(
        self,
        mem: &mut dyn LinearMemory,
        heap_base: u32,
    ) -> Result<Box<dyn HeapAllocator>, AllocError> {
        Ok(match self {
            Self::FreeingBump => Box::new(FreeingBumpAllocator::new(heap_base)),
            Self::Legacy => Box::new(LegacyAllocator::new(mem, heap_base)?),
        })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeingBump => write!(f, "freeing-bump"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// Common contract of every allocation strategy.
///
/// Pointers are byte offsets into the guest's linear memory. The allocator
/// borrows the memory per call and never keeps a reference to it.
pub trait HeapAllocator {
    /// Allocate at least `size` bytes and return the offset of the payload.
    fn allocate(&mut self, mem: &mut dyn LinearMemory, size: u32) -> Result<u32, AllocError>;

    /// Return a payload offset previously handed out by `allocate`.
    fn deallocate(&mut self, mem: &mut dyn LinearMemory, ptr: u32) -> Result<(), AllocError>;

    fn stats(&self) -> AllocationStats;

    fn strategy(&self) -> Strategy;
}
