//! Placement policies
//!
//! Each search takes an already-aligned request size and returns the
//! offset of the chosen free block, still linked in the index. Ties go to
//! the block encountered first in list order; all searches are linear.

use super::free_list::FreeList;
use super::Arena;
use crate::core::types::AllocationStrategy;

/// Picks a free block for `size` payload bytes under `strategy`
pub(crate) fn find_block(
    arena: &Arena,
    free_list: &mut FreeList,
    strategy: AllocationStrategy,
    size: usize,
) -> Option<u32> {
    match strategy {
        AllocationStrategy::FirstFit => first_fit(arena, free_list, size),
        AllocationStrategy::BestFit => best_fit(arena, free_list, size),
        AllocationStrategy::WorstFit => worst_fit(arena, free_list, size),
        AllocationStrategy::NextFit => next_fit(arena, free_list, size),
    }
}

/// First block in list order that fits
fn first_fit(arena: &Arena, free_list: &FreeList, size: usize) -> Option<u32> {
    free_list
        .iter(arena)
        .find(|(_, header)| header.payload_size() >= size)
        .map(|(offset, _)| offset)
}

/// Smallest block that fits; stops early on an exact match
fn best_fit(arena: &Arena, free_list: &FreeList, size: usize) -> Option<u32> {
    let mut best: Option<(u32, usize)> = None;
    for (offset, header) in free_list.iter(arena) {
        let payload = header.payload_size();
        if payload < size {
            continue;
        }
        if payload == size {
            return Some(offset);
        }
        if best.is_none_or(|(_, best_size)| payload < best_size) {
            best = Some((offset, payload));
        }
    }
    best.map(|(offset, _)| offset)
}

/// Largest block that fits
fn worst_fit(arena: &Arena, free_list: &FreeList, size: usize) -> Option<u32> {
    let mut worst: Option<(u32, usize)> = None;
    for (offset, header) in free_list.iter(arena) {
        let payload = header.payload_size();
        if payload < size {
            continue;
        }
        if worst.is_none_or(|(_, worst_size)| payload > worst_size) {
            worst = Some((offset, payload));
        }
    }
    worst.map(|(offset, _)| offset)
}

/// First fit starting from the cursor, scanning circularly
///
/// On success the cursor advances to the successor of the chosen block
/// (wrapping to the head), so consecutive searches spread across the index
/// instead of hammering its front.
fn next_fit(arena: &Arena, free_list: &mut FreeList, size: usize) -> Option<u32> {
    let head = free_list.head()?;
    let start = free_list.cursor().unwrap_or(head);
    let mut current = start;
    let mut steps = 0usize;

    loop {
        let header = arena.header(current);
        if header.payload_size() >= size {
            free_list.set_cursor(Some(header.next_link().unwrap_or(head)));
            return Some(current);
        }
        current = header.next_link().unwrap_or(head);
        steps += 1;
        if current == start || steps >= crate::core::types::tunables::FREE_LIST_WALK_LIMIT {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::BlockHeader;
    use crate::core::types::tunables::BLOCK_HEADER_SIZE;

    /// Arena with free blocks of the given payload sizes, pushed in order
    /// (so the last one ends up at the head of the index)
    fn arena_with_holes(sizes: &[usize]) -> (Arena, FreeList, Vec<u32>) {
        let total: usize = sizes.iter().map(|s| BLOCK_HEADER_SIZE + s).sum::<usize>() + 512;
        let arena = Arena::new(total).expect("arena allocation");
        let mut list = FreeList::new();
        let mut offsets = Vec::new();
        let mut position = 0usize;
        for &size in sizes {
            arena.write_header(position as u32, BlockHeader::free(size));
            list.push_front(&arena, position as u32);
            offsets.push(position as u32);
            position += BLOCK_HEADER_SIZE + size;
        }
        // Used filler so the physical tail never joins the index
        let mut tail = BlockHeader::free(total - position - BLOCK_HEADER_SIZE);
        tail.used = 1;
        tail.client_id = 42;
        arena.write_header(position as u32, tail);
        (arena, list, offsets)
    }

    #[test]
    fn first_fit_takes_list_order() {
        let (arena, mut list, offsets) = arena_with_holes(&[64, 256, 1024]);
        // List order is LIFO: 1024, 256, 64
        let chosen = find_block(&arena, &mut list, AllocationStrategy::FirstFit, 104);
        assert_eq!(chosen, Some(offsets[2]));
    }

    #[test]
    fn best_fit_takes_smallest_sufficient() {
        let (arena, mut list, offsets) = arena_with_holes(&[64, 256, 1024]);
        let chosen = find_block(&arena, &mut list, AllocationStrategy::BestFit, 104);
        assert_eq!(chosen, Some(offsets[1]));
    }

    #[test]
    fn best_fit_stops_on_exact_match() {
        let (arena, mut list, offsets) = arena_with_holes(&[64, 104, 1024]);
        let chosen = find_block(&arena, &mut list, AllocationStrategy::BestFit, 104);
        assert_eq!(chosen, Some(offsets[1]));
    }

    #[test]
    fn worst_fit_takes_largest() {
        let (arena, mut list, offsets) = arena_with_holes(&[64, 256, 1024]);
        let chosen = find_block(&arena, &mut list, AllocationStrategy::WorstFit, 104);
        assert_eq!(chosen, Some(offsets[2]));
    }

    #[test]
    fn ties_go_to_the_first_candidate() {
        let (arena, mut list, offsets) = arena_with_holes(&[256, 256]);
        // List order: offsets[1], offsets[0]
        let best = find_block(&arena, &mut list, AllocationStrategy::BestFit, 104);
        assert_eq!(best, Some(offsets[1]));
        let worst = find_block(&arena, &mut list, AllocationStrategy::WorstFit, 104);
        assert_eq!(worst, Some(offsets[1]));
    }

    #[test]
    fn no_fit_returns_none() {
        let (arena, mut list, _) = arena_with_holes(&[64, 128]);
        for strategy in [
            AllocationStrategy::FirstFit,
            AllocationStrategy::BestFit,
            AllocationStrategy::WorstFit,
            AllocationStrategy::NextFit,
        ] {
            assert_eq!(find_block(&arena, &mut list, strategy, 4096), None);
        }
    }

    #[test]
    fn next_fit_advances_the_cursor() {
        let (arena, mut list, offsets) = arena_with_holes(&[64, 64, 64]);
        // List order: [2, 1, 0], cursor unset -> starts at the head
        let first = next_fit(&arena, &mut list, 48);
        assert_eq!(first, Some(offsets[2]));
        assert_eq!(list.cursor(), Some(offsets[1]));

        let second = next_fit(&arena, &mut list, 48);
        assert_eq!(second, Some(offsets[1]));
        assert_eq!(list.cursor(), Some(offsets[0]));
    }

    #[test]
    fn next_fit_wraps_to_the_head() {
        let (arena, mut list, offsets) = arena_with_holes(&[64, 64, 512]);
        // List order: [512, 64, 64]; park the cursor past the only fit
        list.set_cursor(Some(offsets[1]));
        let chosen = next_fit(&arena, &mut list, 256);
        assert_eq!(chosen, Some(offsets[2]));
        assert_eq!(list.cursor(), Some(offsets[1]));
    }

    #[test]
    fn next_fit_single_pass_terminates() {
        let (arena, mut list, _) = arena_with_holes(&[64]);
        assert_eq!(next_fit(&arena, &mut list, 128), None);
    }
}
