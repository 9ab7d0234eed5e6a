//! Pool facade
//!
//! [`MemoryPool`] owns the arena and is the synchronization authority for
//! it: a single mutex serializes every mutating and observing operation,
//! so the arena, the free index, the next-fit cursor and the counters are
//! all guarded by one lock. Placement, splitting and fusion are delegated
//! to the arena modules; this file enforces the lifecycle, the ownership
//! rules and the failure semantics.
//!
//! Payload pointers handed out by [`MemoryPool::alloc`] stay valid until
//! the pool value is dropped; a destroyed pool keeps its buffer alive (so
//! stale handles never dangle) but fails every subsequent operation with
//! [`PoolError::PoolNotInitialized`].

use std::collections::HashSet;
use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::arena::free_list::FreeList;
use crate::arena::{Arena, coalesce, placement};
use crate::core::config::PoolConfig;
use crate::core::types::AllocationStrategy;
use crate::core::types::tunables::{
    BLOCK_HEADER_SIZE, FREE_LIST_WALK_LIMIT, MEMORY_ALIGNMENT, MIN_BLOCK_SIZE, NO_CLIENT,
};
use crate::error::{PoolError, PoolResult};
use crate::stats::{Counters, PoolMetrics, fragmentation_percent};
use crate::utils::align_up;

/// Bounded arena allocator shared by multiple clients
///
/// The pool carves one pre-reserved contiguous region into variable-sized
/// blocks, tracks which client owns each of them, coalesces neighbors on
/// release and exposes live metrics. Clients are identified by a
/// non-negative id; releasing a block requires the id it was allocated
/// under.
pub struct MemoryPool {
    total_size: usize,
    zero_on_alloc: bool,
    state: Mutex<PoolState>,
}

/// Everything guarded by the pool mutex
struct PoolState {
    arena: Arena,
    free_list: FreeList,
    strategy: AllocationStrategy,
    counters: Counters,
    active: bool,
}

impl MemoryPool {
    /// Creates a pool backed by a zero-filled arena of `config.total_size`
    /// bytes, installed as one free block
    ///
    /// # Errors
    /// `InvalidParam` when the arena cannot hold even a single minimal
    /// block, or exceeds the offset range of the block index.
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        let PoolConfig {
            total_size,
            strategy,
            zero_on_alloc,
        } = config;

        if total_size < BLOCK_HEADER_SIZE + MIN_BLOCK_SIZE {
            return Err(PoolError::invalid_param(format!(
                "pool of {total_size} bytes cannot hold a single block"
            )));
        }
        if total_size > u32::MAX as usize {
            return Err(PoolError::invalid_param(format!(
                "pool of {total_size} bytes exceeds the block offset range"
            )));
        }

        let arena = Arena::new(total_size)?;
        arena.write_header(0, crate::arena::BlockHeader::free(total_size - BLOCK_HEADER_SIZE));
        let mut free_list = FreeList::new();
        free_list.push_front(&arena, 0);

        info!(total_size, ?strategy, "pool created");

        Ok(Self {
            total_size,
            zero_on_alloc,
            state: Mutex::new(PoolState {
                arena,
                free_list,
                strategy,
                counters: Counters::default(),
                active: true,
            }),
        })
    }

    /// Shorthand for [`MemoryPool::new`] with just a size and strategy
    pub fn with_capacity(total_size: usize, strategy: AllocationStrategy) -> PoolResult<Self> {
        Self::new(PoolConfig::new(total_size).with_strategy(strategy))
    }

    /// Allocates `size` payload bytes on behalf of `client_id`
    ///
    /// The size is aligned up to the 8-byte grid; the returned payload is
    /// zeroed (unless configured otherwise) and owned by `client_id` until
    /// released. Failed requests increment the failure counter.
    ///
    /// # Errors
    /// - `InvalidParam` for a zero size
    /// - `ExceedsCapacity` when the aligned size cannot fit the arena
    /// - `OutOfMemory` when no free block satisfies the request
    /// - `PoolNotInitialized` after [`MemoryPool::destroy`]
    pub fn alloc(&self, size: usize, client_id: i64) -> PoolResult<NonNull<u8>> {
        let mut guard = self.state.lock();
        if !guard.active {
            error!("allocation attempted on an inactive pool");
            return Err(PoolError::PoolNotInitialized);
        }

        if size == 0 {
            guard.counters.failed_allocations += 1;
            return Err(PoolError::invalid_param("zero-sized allocation"));
        }
        if client_id < 0 {
            guard.counters.failed_allocations += 1;
            return Err(PoolError::invalid_param(format!(
                "negative client id {client_id}"
            )));
        }

        let aligned = align_up(size, MEMORY_ALIGNMENT);
        if aligned > self.total_size - BLOCK_HEADER_SIZE {
            guard.counters.failed_allocations += 1;
            return Err(PoolError::exceeds_capacity(aligned, self.total_size));
        }

        let state = &mut *guard;
        let Some(block) =
            placement::find_block(&state.arena, &mut state.free_list, state.strategy, aligned)
        else {
            state.counters.failed_allocations += 1;
            return Err(PoolError::out_of_memory(aligned));
        };

        let cursor_was_here = state.free_list.cursor() == Some(block);
        state.free_list.unlink(&state.arena, block);
        let residual = coalesce::split_block(&state.arena, &mut state.free_list, block, aligned);
        if cursor_was_here {
            // The cursor followed the consumed block; resume from the cut
            // residual, or from the head when nothing was cut
            let fallback = state.free_list.head();
            state.free_list.set_cursor(residual.or(fallback));
        }

        let mut header = state.arena.header(block);
        header.used = 1;
        header.client_id = client_id;
        header.clear_links();
        state.arena.write_header(block, header);

        if self.zero_on_alloc {
            state.arena.zero_payload(block, header.payload_size());
        }

        state.counters.allocation_count += 1;
        state.counters.used_payload_bytes += header.payload_size();
        state.counters.used_blocks += 1;

        debug!(
            client_id,
            size = header.payload_size(),
            offset = block,
            "allocated block"
        );
        Ok(state.arena.payload_ptr(block))
    }

    /// Releases the block behind `payload` on behalf of `client_id`
    ///
    /// The block is fused with its free physical neighbors before going
    /// back into the free index. Releasing an already free block is a
    /// warned no-op; counters are only touched on an actual release.
    ///
    /// # Errors
    /// - `Corruption` when the pointer does not denote a live block of
    ///   this arena
    /// - `OwnershipViolation` when the block belongs to another client
    /// - `PoolNotInitialized` after [`MemoryPool::destroy`]
    pub fn free(&self, payload: NonNull<u8>, client_id: i64) -> PoolResult<()> {
        let mut guard = self.state.lock();
        if !guard.active {
            error!("release attempted on an inactive pool");
            return Err(PoolError::PoolNotInitialized);
        }

        let state = &mut *guard;
        let Some(block) = state.arena.offset_of_payload(payload) else {
            return Err(PoolError::corruption(format!(
                "payload {payload:p} is not inside the arena"
            )));
        };

        let header = state.arena.header(block);
        if !header.is_valid() {
            return Err(PoolError::corruption(format!(
                "block at offset {block} has a dead header"
            )));
        }
        if state.arena.block_end(block, &header) > self.total_size {
            return Err(PoolError::corruption(format!(
                "block at offset {block} extends past the arena"
            )));
        }
        if !header.is_used() {
            warn!(offset = block, client_id, "release of an already free block");
            return Ok(());
        }
        if header.client_id != client_id {
            return Err(PoolError::ownership_violation(header.client_id, client_id));
        }

        state.counters.free_count += 1;
        state.counters.used_payload_bytes -= header.payload_size();
        state.counters.used_blocks -= 1;

        let mut freed = header;
        freed.used = 0;
        freed.client_id = NO_CLIENT;
        freed.clear_links();
        state.arena.write_header(block, freed);

        coalesce::fuse_with_neighbors(&state.arena, &mut state.free_list, block);

        debug!(
            client_id,
            size = header.payload_size(),
            offset = block,
            "released block"
        );
        Ok(())
    }

    /// Switches the placement strategy and resets the next-fit cursor
    pub fn set_strategy(&self, strategy: AllocationStrategy) -> PoolResult<()> {
        let mut state = self.state.lock();
        if !state.active {
            return Err(PoolError::PoolNotInitialized);
        }
        state.strategy = strategy;
        state.free_list.set_cursor(None);
        debug!(?strategy, "placement strategy changed");
        Ok(())
    }

    /// Current placement strategy
    pub fn strategy(&self) -> AllocationStrategy {
        self.state.lock().strategy
    }

    /// Arena size in bytes
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// True until the pool is destroyed
    pub fn is_valid(&self) -> bool {
        self.state.lock().active
    }

    /// Tears the pool down
    ///
    /// Idempotent. Outstanding blocks are reported as a potential leak but
    /// do not prevent destruction; subsequent operations fail with
    /// `PoolNotInitialized`. The arena buffer itself is released when the
    /// pool value drops, so stale payload pointers never dangle.
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        if !state.active {
            return;
        }
        if state.counters.used_blocks > 0 {
            warn!(
                used_blocks = state.counters.used_blocks,
                "destroying pool with blocks still in use, possible leak"
            );
        }
        state.active = false;
        state.free_list.clear();
        info!("pool destroyed");
    }

    /// Takes a consistent snapshot of the pool state
    ///
    /// Walks the arena in physical order under the mutex; see
    /// [`PoolMetrics`] for the accounting rules.
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.state.lock();
        let mut metrics = PoolMetrics {
            total_memory: self.total_size,
            ..Default::default()
        };

        for (_, header) in state.arena.blocks() {
            let span = BLOCK_HEADER_SIZE + header.payload_size();
            metrics.block_count += 1;
            if header.is_used() {
                metrics.used_memory += span;
                metrics.used_blocks += 1;
            } else {
                metrics.free_memory += span;
                metrics.free_blocks += 1;
                metrics.largest_free_block = metrics.largest_free_block.max(span);
            }
        }

        metrics.fragmentation = fragmentation_percent(
            metrics.largest_free_block,
            metrics.free_memory,
            metrics.free_blocks,
        );
        metrics.allocation_count = state.counters.allocation_count;
        metrics.free_count = state.counters.free_count;
        metrics.failed_allocations = state.counters.failed_allocations;
        metrics
    }

    /// Verifies the free index: every node live, marked free and inside
    /// the arena, with the walk bounded to detect cycles
    pub fn check(&self) -> bool {
        let state = self.state.lock();
        let mut errors = 0usize;
        let mut current = state.free_list.head();
        let mut steps = 0usize;

        while let Some(offset) = current {
            if steps >= FREE_LIST_WALK_LIMIT {
                error!("possible cycle in free index");
                errors += 1;
                break;
            }
            if !state.arena.header_in_bounds(offset) {
                error!(offset, "free index entry outside the arena");
                errors += 1;
                break;
            }
            let header = state.arena.header(offset);
            if !header.is_valid() {
                error!(offset, "free index links a dead header");
                errors += 1;
                break;
            }
            if header.is_used() {
                error!(offset, "used block linked in the free index");
                errors += 1;
            }
            current = header.next_link();
            steps += 1;
        }

        errors == 0
    }

    /// Full structural audit of the arena and the free index
    ///
    /// Stronger than [`MemoryPool::check`]: verifies that the block
    /// sequence tiles the arena exactly, that no two free blocks are
    /// physically adjacent, that the free index matches the set of free
    /// blocks, and that the incremental counters agree with the layout.
    ///
    /// # Errors
    /// `Corruption` describing the first violated invariant.
    pub fn validate(&self) -> PoolResult<()> {
        let state = self.state.lock();
        if !state.active {
            return Err(PoolError::PoolNotInitialized);
        }
        let arena = &state.arena;

        let mut free_offsets = HashSet::new();
        let mut used_payload = 0usize;
        let mut used_blocks = 0usize;
        let mut prev_free = false;

        let mut walk = arena.blocks();
        for (offset, header) in walk.by_ref() {
            if header.is_used() {
                if header.client_id < 0 {
                    return Err(PoolError::corruption(format!(
                        "used block at offset {offset} has no owner"
                    )));
                }
                used_payload += header.payload_size();
                used_blocks += 1;
                prev_free = false;
            } else {
                if prev_free {
                    return Err(PoolError::corruption(format!(
                        "adjacent free blocks at offset {offset}"
                    )));
                }
                free_offsets.insert(offset);
                prev_free = true;
            }
        }
        let covered = walk.covered();
        if covered != self.total_size {
            return Err(PoolError::corruption(format!(
                "block sequence covers {covered} of {} arena bytes",
                self.total_size
            )));
        }

        let mut listed = 0usize;
        for (offset, header) in state.free_list.iter(arena) {
            if header.is_used() {
                return Err(PoolError::corruption(format!(
                    "used block at offset {offset} linked in the free index"
                )));
            }
            if !free_offsets.contains(&offset) {
                return Err(PoolError::corruption(format!(
                    "free index entry at offset {offset} is not a free arena block"
                )));
            }
            listed += 1;
        }
        if listed != free_offsets.len() {
            return Err(PoolError::corruption(format!(
                "free index holds {listed} blocks, arena has {}",
                free_offsets.len()
            )));
        }

        if used_payload != state.counters.used_payload_bytes
            || used_blocks != state.counters.used_blocks
        {
            return Err(PoolError::corruption(format!(
                "counters disagree with the layout: {used_blocks} used blocks / \
                 {used_payload} payload bytes found"
            )));
        }

        Ok(())
    }

    /// External fragmentation of the free space, in percent
    pub fn fragmentation(&self) -> f64 {
        self.metrics().fragmentation
    }

    /// Bytes covered by allocated blocks, headers included
    pub fn used_memory(&self) -> usize {
        self.metrics().used_memory
    }

    /// Bytes covered by free blocks, headers included
    pub fn free_memory(&self) -> usize {
        self.metrics().free_memory
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.active && state.counters.used_blocks > 0 {
            warn!(
                used_blocks = state.counters.used_blocks,
                "pool dropped with blocks still in use, possible leak"
            );
        }
    }
}

impl core::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryPool")
            .field("total_size", &self.total_size)
            .field("strategy", &state.strategy)
            .field("active", &state.active)
            .field("used_blocks", &state.counters.used_blocks)
            .finish_non_exhaustive()
    }
}
