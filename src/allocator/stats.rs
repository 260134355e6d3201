//! Allocation statistics for monitoring and debugging

/// Snapshot of heap usage.
///
/// Block sizes include the 8-byte header, so `bytes_allocated` is the heap
/// footprint of live blocks rather than the sum of requested sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Footprint of currently live blocks.
    pub bytes_allocated: u32,
    /// Highest `bytes_allocated` ever observed.
    pub bytes_allocated_peak: u32,
    /// Footprint of every block ever handed out.
    pub bytes_allocated_sum: u64,
    /// Bytes carved past the heap base.
    pub address_space_used: u32,
    pub allocations: u64,
    pub deallocations: u64,
}

impl AllocationStats {
    pub(crate) fn record_allocation(&mut self, block_size: u32) {
        self.bytes_allocated = self.bytes_allocated.saturating_add(block_size);
        self.bytes_allocated_peak = self.bytes_allocated_peak.max(self.bytes_allocated);
        self.bytes_allocated_sum = self.bytes_allocated_sum.saturating_add(u64::from(block_size));
        self.allocations += 1;
    }

    pub(crate) fn record_deallocation(&mut self, block_size: u32) {
        self.bytes_allocated = self.bytes_allocated.saturating_sub(block_size);
        self.deallocations += 1;
    }
}
