//! # memory-pool
//!
//! Bounded arena allocator for multiple concurrent clients.
//!
//! One pre-reserved contiguous arena is carved into variable-sized blocks
//! under a single pool-wide mutex. The crate provides:
//! - Four placement strategies: first-fit, best-fit, worst-fit, next-fit
//! - Splitting of oversize blocks and coalescing of free neighbors
//! - Client-id ownership of every block, with per-client bulk release
//! - Live metrics and structural integrity checks
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use memory_pool::prelude::*;
//!
//! fn main() -> PoolResult<()> {
//!     let pool = Arc::new(MemoryPool::with_capacity(
//!         64 * 1024,
//!         AllocationStrategy::BestFit,
//!     )?);
//!     let client = MemoryClient::new(1, Arc::clone(&pool))?;
//!
//!     let payload = client.alloc(256)?;
//!     client.free(payload)?;
//!
//!     assert!(pool.check());
//!     assert_eq!(pool.metrics().used_blocks, 0);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - The arena layout is the authoritative structure: block headers live
//!   inside the buffer and the physical sequence of blocks tiles it
//!   exactly. The free index is a doubly-linked list threaded through the
//!   free headers, addressed by byte offsets rather than pointers.
//! - A single mutex per pool serializes every operation; this favors
//!   correctness of coalescing under contention over throughput.
//! - Errors are plain values built with `thiserror`; diagnostics go
//!   through `tracing` and are silent without a subscriber.

#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
// Bulk allows for doc lints; the error enum documents its own variants
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Precision loss in usize -> f64 casts is acceptable for metrics
#![allow(clippy::cast_precision_loss)]
// Header fields are explicitly sized; widening/narrowing at the offset
// boundary is reviewed per-site
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
// inline(always) on the alignment helpers is intentional for hot paths
#![allow(clippy::inline_always)]

// Error types
pub mod error;

// Core modules
mod arena;
pub mod client;
pub mod core;
pub mod pool;
pub mod stats;
pub mod utils;

// Re-export the primary types at the crate root
pub use crate::client::MemoryClient;
pub use crate::core::config::PoolConfig;
pub use crate::core::types::AllocationStrategy;
pub use crate::error::{PoolError, PoolResult};
pub use crate::pool::MemoryPool;
pub use crate::stats::PoolMetrics;

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::client::MemoryClient;
    pub use crate::core::config::PoolConfig;
    pub use crate::core::types::tunables::{BLOCK_HEADER_SIZE, MIN_BLOCK_SIZE};
    pub use crate::core::types::AllocationStrategy;
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::pool::MemoryPool;
    pub use crate::stats::PoolMetrics;
}
