//! Pool metrics
//!
//! The pool keeps a handful of counters up to date on every operation;
//! everything else in a [`PoolMetrics`] snapshot is recomputed from a
//! physical arena walk at query time, so the snapshot is always consistent
//! with the layout it describes.

/// Point-in-time view of a pool's state
///
/// Memory figures are header-inclusive: a block accounts for its header
/// plus its payload, so `used_memory + free_memory == total_memory`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolMetrics {
    /// Arena size in bytes
    pub total_memory: usize,
    /// Bytes covered by allocated blocks (headers included)
    pub used_memory: usize,
    /// Bytes covered by free blocks (headers included)
    pub free_memory: usize,
    /// External fragmentation in percent; see [`fragmentation_percent`]
    pub fragmentation: f64,
    /// Blocks in the arena, used or free
    pub block_count: usize,
    /// Allocated blocks
    pub used_blocks: usize,
    /// Free blocks
    pub free_blocks: usize,
    /// Largest free block (header included)
    pub largest_free_block: usize,
    /// Successful allocations over the pool's lifetime
    pub allocation_count: u64,
    /// Successful releases over the pool's lifetime
    pub free_count: u64,
    /// Rejected allocations (zero, oversized, or no fit)
    pub failed_allocations: u64,
}

/// Lifetime counters maintained incrementally under the pool mutex
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub allocation_count: u64,
    pub free_count: u64,
    pub failed_allocations: u64,
    /// Payload bytes currently allocated (slack included, headers not)
    pub used_payload_bytes: usize,
    /// Allocated blocks currently outstanding
    pub used_blocks: usize,
}

/// External fragmentation of the free space, in percent
///
/// Defined as `(1 - largest_free_block / free_memory) * 100` once the free
/// space is split across more than one block; a single free region (or no
/// free space at all) counts as unfragmented.
#[must_use]
pub fn fragmentation_percent(
    largest_free_block: usize,
    free_memory: usize,
    free_blocks: usize,
) -> f64 {
    if free_blocks > 1 && free_memory > 0 {
        let ratio = 1.0 - (largest_free_block as f64 / free_memory as f64);
        (ratio * 100.0).max(0.0)
    } else {
        0.0
    }
}
