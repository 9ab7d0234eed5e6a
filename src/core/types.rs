//! Common types and constants for pool management

/// Compile-time tunables of the block layout and safety bounds
pub mod tunables {
    /// Alignment applied to every payload size (and to payload addresses,
    /// since the header size is a multiple of it)
    pub const MEMORY_ALIGNMENT: usize = 8;

    /// Smallest payload a block may carry; residuals below
    /// `BLOCK_HEADER_SIZE + MIN_BLOCK_SIZE` are left as slack instead of
    /// being split off
    pub const MIN_BLOCK_SIZE: usize = 32;

    /// Liveness marker stored in every block header; zeroed when a header
    /// is absorbed by coalescing
    pub const MAGIC_NUMBER: u32 = 0xDEAD_BEEF;

    /// Size in bytes of the in-arena block header
    pub const BLOCK_HEADER_SIZE: usize = 32;

    /// Upper bound on fusion rounds for a single release; exceeding it
    /// indicates a corrupted layout
    pub const MAX_FUSE_ITERATIONS: usize = 100;

    /// Upper bound on free-index walks; exceeding it indicates a cycle
    pub const FREE_LIST_WALK_LIMIT: usize = 1000;

    /// `client_id` value carried by free blocks
    pub const NO_CLIENT: i64 = -1;
}

/// Memory size constants
pub mod size {
    /// 1 Kilobyte
    pub const KB: usize = 1024;

    /// 1 Megabyte
    pub const MB: usize = 1024 * KB;
}

/// Placement strategy used to pick a free block for an allocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AllocationStrategy {
    /// First fit - use the first sufficient block in index order
    #[default]
    FirstFit,
    /// Best fit - use the smallest sufficient block
    BestFit,
    /// Worst fit - use the largest sufficient block
    WorstFit,
    /// Next fit - resume scanning from where the previous search stopped
    NextFit,
}
