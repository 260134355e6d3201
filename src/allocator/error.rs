//! Allocator error taxonomy

use thiserror::Error;

use super::order::MAX_POSSIBLE_ALLOCATION;
use crate::memory::OutOfBounds;

/// Failure of a size-class conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("requested allocation of {0} bytes exceeds the size-class ceiling")]
    TooLarge(u32),
    #[error("invalid order {0}")]
    Invalid(u32),
}

/// Errors surfaced by `allocate`/`deallocate`.
///
/// All of these are returned to the caller. Internal consistency violations
/// of the memory substrate are not represented here; they panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("requested allocation of {requested} bytes exceeds maximum of {max} bytes")]
    RequestTooLarge { requested: u32, max: u32 },

    #[error("allocator out of space: {reason}")]
    OutOfSpace { reason: String },

    #[error("corrupted header at {header_ptr:#x}: {reason}")]
    CorruptedHeader { header_ptr: u32, reason: String },

    #[error("header pointer {header_ptr:#x} runs past memory size {memory_size:#x}")]
    OutOfBoundsPointer { header_ptr: u32, memory_size: u32 },

    #[error("the allocator has been poisoned")]
    PoisonedAllocator,

    #[error("pointer {ptr:#x} was not handed out by this allocator or is already free")]
    InvalidFree { ptr: u32 },

    #[error("memory access failed: {0}")]
    MemoryAccess(#[from] OutOfBounds),
}

impl AllocError {
    pub(crate) fn out_of_space(reason: impl Into<String>) -> Self {
        Self::OutOfSpace { reason: reason.into() }
    }

    pub(crate) fn too_large(requested: u32) -> Self {
        Self::RequestTooLarge {
            requested,
            max: MAX_POSSIBLE_ALLOCATION,
        }
    }

    pub(crate) fn corrupted(header_ptr: u32, reason: impl Into<String>) -> Self {
        Self::CorruptedHeader {
            header_ptr,
            reason: reason.into(),
        }
    }

    /// Whether this error means the heap metadata can no longer be trusted.
    pub fn poisons(&self) -> bool {
        matches!(
            self,
            Self::CorruptedHeader { .. } | Self::OutOfBoundsPointer { .. } | Self::MemoryAccess(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_metadata_failures_poison() {
        assert!(AllocError::corrupted(8, "x").poisons());
        assert!(AllocError::OutOfBoundsPointer { header_ptr: 0, memory_size: 0 }.poisons());
        assert!(!AllocError::out_of_space("full").poisons());
        assert!(!AllocError::PoisonedAllocator.poisons());
        assert!(!AllocError::InvalidFree { ptr: 8 }.poisons());
    }

    #[test]
    fn too_large_reports_ceiling() {
        assert_eq!(
            AllocError::too_large(1 << 26),
            AllocError::RequestTooLarge { requested: 1 << 26, max: 1 << 25 }
        );
        assert_eq!(
            AllocError::too_large(1 << 26).to_string(),
            "requested allocation of 67108864 bytes exceeds maximum of 33554432 bytes"
        );
    }
}
