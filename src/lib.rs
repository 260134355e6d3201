//! wasm-heap - heap allocator for guest code in a wasm32 linear memory
//!
//! Guest code calls an imported `malloc`; the host answers with a byte
//! offset into the guest's own linear memory and keeps its bookkeeping in
//! headers stored in that same memory.

pub mod allocator;
pub mod config;
pub mod host;
pub mod logging;
pub mod memory;

// Re-export core types
pub use allocator::{AllocError, AllocationStats, FreeingBumpAllocator, HeapAllocator, LegacyAllocator, Strategy};
pub use config::{ConfigError, HeapConfig};
pub use host::{HostAllocator, Trap};
pub use memory::{LinearMemory, VecMemory, PAGE_SIZE};
