//! Host import surface - what guest code calls to get heap memory
//!
//! Design: The embedding builds one `HostAllocator` per module instance and
//! hands it to whatever dispatches host calls. It owns the instance's memory
//! handle and the allocation strategy chosen at construction; there is no
//! global or per-call context lookup.
//!
//! Any allocator failure is a trap: the guest call is aborted and the guest
//! never sees an error code.

use thiserror::Error;
use tracing::debug_span;

use crate::allocator::{AllocError, AllocationStats, HeapAllocator, Strategy};
use crate::config::HeapConfig;
use crate::memory::{LinearMemory, VecMemory};

/// Import name of the allocation entry point.
pub const MALLOC_IMPORT: &str = "ext_allocator_malloc_version_1";

/// Import name of the deallocation entry point.
pub const FREE_IMPORT: &str = "ext_allocator_free_version_1";

/// Failure of a host import; aborts the current guest call.
#[derive(Debug, Error)]
pub enum Trap {
    #[error("{import} failed: {source}")]
    Allocator {
        import: &'static str,
        #[source]
        source: AllocError,
    },

    #[error("unknown host import `{0}`")]
    UnknownImport(String),
}

impl Trap {
    /// Allocator error behind this trap, if any.
    pub fn alloc_error(&self) -> Option<&AllocError> {
        match self {
            Self::Allocator { source, .. } => Some(source),
            Self::UnknownImport(_) => None,
        }
    }
}

pub struct HostAllocator<M: LinearMemory> {
    memory: M,
    allocator: Box<dyn HeapAllocator>,
}

impl<M: LinearMemory> HostAllocator<M> {
    /// Bind a `strategy` allocator to `memory` with the heap starting at
    /// `heap_base` (usually the guest's exported `__heap_base`).
    pub fn new(mut memory: M, heap_base: u32, strategy: Strategy) -> Result<Self, AllocError> {
        let allocator = strategy.build(&mut memory, heap_base)?;
        tracing::debug!(%strategy, heap_base, memory_size = memory.size(), "host allocator ready");
        Ok(Self { memory, allocator })
    }

    /// `ext_allocator_malloc_version_1(size) -> ptr`
    pub fn malloc(&mut self, size: u32) -> Result<u32, Trap> {
        let _span = debug_span!("host_import", import = MALLOC_IMPORT, size).entered();
        self.allocator
            .allocate(&mut self.memory, size)
            .map_err(|source| Trap::Allocator {
                import: MALLOC_IMPORT,
                source,
            })
    }

    /// `ext_allocator_free_version_1(ptr)`
    pub fn free(&mut self, ptr: u32) -> Result<(), Trap> {
        let _span = debug_span!("host_import", import = FREE_IMPORT, ptr).entered();
        self.allocator
            .deallocate(&mut self.memory, ptr)
            .map_err(|source| Trap::Allocator {
                import: FREE_IMPORT,
                source,
            })
    }

    /// Dispatch a call by import name. Returns the import's result value,
    /// `None` for imports without one.
    pub fn call(&mut self, import: &str, arg: u32) -> Result<Option<u32>, Trap> {
        match import {
            MALLOC_IMPORT => self.malloc(arg).map(Some),
            FREE_IMPORT => self.free(arg).map(|()| None),
            other => Err(Trap::UnknownImport(other.to_string())),
        }
    }

    pub fn stats(&self) -> AllocationStats {
        self.allocator.stats()
    }

    pub fn strategy(&self) -> Strategy {
        self.allocator.strategy()
    }

    #[inline]
    pub fn memory(&self) -> &M {
        &self.memory
    }

    #[inline]
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
}

impl HostAllocator<VecMemory> {
    /// Fresh in-process memory and allocator as described by `config`.
    pub fn from_config(config: &HeapConfig) -> Result<Self, AllocError> {
        let memory = VecMemory::new(config.memory.initial_pages, config.memory.max_pages).ok_or_else(|| {
            AllocError::OutOfSpace {
                reason: format!(
                    "initial pages {} exceed the memory maximum",
                    config.memory.initial_pages
                ),
            }
        })?;
        Self::new(memory, config.allocator.heap_base, config.allocator.strategy)
    }
}
