//! Split and coalesce engine
//!
//! Splitting carves the tail of an oversize free block into a new free
//! block; coalescing fuses a released block with its physical neighbors
//! until none of them is free. Both keep the layout invariant intact: the
//! block sequence always tiles the arena exactly, and no two adjacent
//! free blocks survive a release.

use tracing::{debug, error};

use super::free_list::FreeList;
use super::{Arena, BlockHeader};
use crate::core::types::tunables::{BLOCK_HEADER_SIZE, MAX_FUSE_ITERATIONS, MIN_BLOCK_SIZE};

/// Splits the block at `offset` down to `size` payload bytes
///
/// The block must already be unlinked from the free index. When the
/// residual is too small to carry a header plus `MIN_BLOCK_SIZE` payload,
/// the block keeps its full size and the excess stays as slack inside the
/// allocation. Returns the offset of the new free block, if one was cut.
pub(crate) fn split_block(
    arena: &Arena,
    free_list: &mut FreeList,
    offset: u32,
    size: usize,
) -> Option<u32> {
    let mut header = arena.header(offset);
    debug_assert!(header.payload_size() >= size);

    let remaining = header.payload_size() - size;
    if remaining < BLOCK_HEADER_SIZE + MIN_BLOCK_SIZE {
        return None;
    }

    let residual = offset as usize + BLOCK_HEADER_SIZE + size;
    debug_assert!(residual + BLOCK_HEADER_SIZE <= arena.total_size());

    arena.write_header(residual as u32, BlockHeader::free(remaining - BLOCK_HEADER_SIZE));
    header.size = size as u64;
    arena.write_header(offset, header);
    free_list.push_front(arena, residual as u32);

    debug!(offset, size, residual, "split residual into a new free block");
    Some(residual as u32)
}

/// Fuses the released block at `offset` with every free physical neighbor,
/// then inserts the result into the free index
///
/// The caller has already marked the block free and detached it from any
/// client. Absorbed neighbors are unlinked from the index first and
/// poisoned afterwards, so the index never holds a dead header. A fused
/// round bound guards against corruption-induced loops.
pub(crate) fn fuse_with_neighbors(arena: &Arena, free_list: &mut FreeList, offset: u32) {
    let mut block = offset;
    let mut rounds = 0usize;

    loop {
        rounds += 1;
        if rounds > MAX_FUSE_ITERATIONS {
            error!(offset = block, "fusion bound exceeded, arena layout is suspect");
            break;
        }

        let mut header = arena.header(block);

        // Forward: absorb the physically next block while it is free
        let next = arena.block_end(block, &header);
        if next + BLOCK_HEADER_SIZE <= arena.total_size() {
            let next_header = arena.header(next as u32);
            if next_header.is_valid() && !next_header.is_used() {
                free_list.unlink(arena, next as u32);
                header.size += (BLOCK_HEADER_SIZE + next_header.payload_size()) as u64;
                arena.write_header(block, header);
                arena.poison(next as u32);
                debug!(block, absorbed = next, "fused with next block");
                continue;
            }
        }

        // Backward: let a free physical predecessor absorb this block
        if let Some((prev_offset, mut prev_header)) = arena.physical_prev(block) {
            if !prev_header.is_used() {
                free_list.unlink(arena, block);
                prev_header.size += (BLOCK_HEADER_SIZE + header.payload_size()) as u64;
                arena.write_header(prev_offset, prev_header);
                arena.poison(block);
                debug!(block = prev_offset, absorbed = block, "fused with previous block");
                block = prev_offset;
                continue;
            }
        }

        break;
    }

    let header = arena.header(block);
    if header.is_valid() && !header.is_used() && !free_list.contains(arena, block) {
        free_list.push_front(arena, block);
    }
}
