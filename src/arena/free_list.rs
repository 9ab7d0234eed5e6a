//! Free-block index
//!
//! A doubly-linked list threaded through the headers of free blocks, plus
//! the resume cursor for next-fit placement. The list is an index over the
//! physical layout, not the authority: membership is derived from the
//! header links, which are `NIL` exactly when a block is out of the index.
//! Insertion is LIFO at the head; the list is not address-sorted.

use tracing::{debug, error};

use super::{Arena, NIL};
use crate::core::types::tunables::{FREE_LIST_WALK_LIMIT, NO_CLIENT};

/// Head of the free index plus the next-fit cursor
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    head: Option<u32>,
    /// Resume position for next-fit; `None` falls back to the head
    cursor: Option<u32>,
}

impl FreeList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn head(&self) -> Option<u32> {
        self.head
    }

    #[inline]
    pub(crate) fn cursor(&self) -> Option<u32> {
        self.cursor
    }

    #[inline]
    pub(crate) fn set_cursor(&mut self, cursor: Option<u32>) {
        self.cursor = cursor;
    }

    /// Clears the head and cursor; the pool uses this on teardown
    pub(crate) fn clear(&mut self) {
        self.head = None;
        self.cursor = None;
    }

    /// Inserts a block at the head, marking its header free
    pub(crate) fn push_front(&mut self, arena: &Arena, offset: u32) {
        let mut header = arena.header(offset);
        debug_assert!(header.is_valid());

        header.next = self.head.unwrap_or(NIL);
        header.prev = NIL;
        header.used = 0;
        header.client_id = NO_CLIENT;
        arena.write_header(offset, header);

        if let Some(old_head) = self.head {
            let mut old = arena.header(old_head);
            old.prev = offset;
            arena.write_header(old_head, old);
        }
        self.head = Some(offset);

        debug!(offset, size = header.size, "block added to free index");
    }

    /// True when the block's links (or the head) place it in the index
    ///
    /// Links are `NIL` whenever a block is outside the index, so this is a
    /// constant-time membership test.
    pub(crate) fn contains(&self, arena: &Arena, offset: u32) -> bool {
        let header = arena.header(offset);
        self.head == Some(offset) || header.next_link().is_some() || header.prev_link().is_some()
    }

    /// Removes a block from the index
    ///
    /// Tolerates blocks that are not linked (double removal, or a block
    /// being released that was never inserted) by returning `false`. When
    /// the next-fit cursor points at the removed block it is retargeted to
    /// the block's successor, falling back to the new head.
    pub(crate) fn unlink(&mut self, arena: &Arena, offset: u32) -> bool {
        if !self.contains(arena, offset) {
            debug!(offset, "unlink of a block not in the free index");
            return false;
        }

        let mut header = arena.header(offset);
        let retarget_cursor = self.cursor == Some(offset);
        if retarget_cursor {
            self.cursor = header.next_link();
        }

        match header.prev_link() {
            Some(prev) => {
                let mut prev_header = arena.header(prev);
                prev_header.next = header.next;
                arena.write_header(prev, prev_header);
            }
            None => self.head = header.next_link(),
        }
        if let Some(next) = header.next_link() {
            let mut next_header = arena.header(next);
            next_header.prev = header.prev;
            arena.write_header(next, next_header);
        }

        header.clear_links();
        arena.write_header(offset, header);

        if retarget_cursor && self.cursor.is_none() {
            self.cursor = self.head;
        }
        true
    }

    /// Walks the index in list order, bounded against corrupt cycles
    pub(crate) fn iter<'a>(&self, arena: &'a Arena) -> FreeListIter<'a> {
        FreeListIter {
            arena,
            current: self.head,
            steps: 0,
        }
    }

    /// Number of blocks currently in the index (bounded walk)
    #[cfg(test)]
    pub(crate) fn len(&self, arena: &Arena) -> usize {
        self.iter(arena).count()
    }
}

/// Iterator over `(offset, header)` pairs in free-list order
pub(crate) struct FreeListIter<'a> {
    arena: &'a Arena,
    current: Option<u32>,
    steps: usize,
}

impl Iterator for FreeListIter<'_> {
    type Item = (u32, super::BlockHeader);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.current?;
        if self.steps >= FREE_LIST_WALK_LIMIT {
            error!("free index walk exceeded {FREE_LIST_WALK_LIMIT} steps, possible cycle");
            return None;
        }
        if !self.arena.header_in_bounds(offset) {
            error!(offset, "free index link points outside the arena");
            return None;
        }
        let header = self.arena.header(offset);
        if !header.is_valid() {
            error!(offset, "free index links a poisoned header");
            return None;
        }
        self.current = header.next_link();
        self.steps += 1;
        Some((offset, header))
    }
}
