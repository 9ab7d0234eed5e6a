//! Arena buffer and physical block layout
//!
//! # Safety
//!
//! The arena owns one contiguous, 8-aligned allocation that is carved into
//! blocks by the pool. All bookkeeping works on byte offsets validated
//! against `total_size`; raw pointers appear only at two edges:
//! - header records are copied in and out with `ptr::read`/`ptr::write`
//!   (no reference into the buffer ever outlives a call), and
//! - payload pointers handed to callers are computed from validated
//!   offsets.
//!
//! Because the buffer is only ever touched through raw pointers, payload
//! regions held by clients never alias a Rust reference, and header
//! accesses stay disjoint from payload bytes by layout.

pub(crate) mod coalesce;
pub(crate) mod free_list;
pub(crate) mod header;
pub(crate) mod placement;

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr::{self, NonNull};

use crate::core::types::tunables::{BLOCK_HEADER_SIZE, MEMORY_ALIGNMENT};
use crate::error::PoolError;
use crate::utils::is_aligned;

pub(crate) use header::{BlockHeader, NIL};

/// Contiguous region backing one pool
///
/// The arena is allocated once, never remapped and never grown. Block
/// headers live inside the buffer; the physical sequence of blocks tiles
/// it exactly.
pub(crate) struct Arena {
    ptr: NonNull<u8>,
    total_size: usize,
}

impl Arena {
    /// Allocates a zero-filled arena of `total_size` bytes
    ///
    /// The caller has already validated the size against the minimum block
    /// layout and the `u32` offset range.
    pub(crate) fn new(total_size: usize) -> Result<Self, PoolError> {
        let layout = Layout::from_size_align(total_size, MEMORY_ALIGNMENT)
            .map_err(|_| PoolError::invalid_param("arena layout overflow"))?;

        // SAFETY: Allocating raw memory from the global allocator.
        // - layout has non-zero size (total_size >= header + MIN_BLOCK_SIZE)
        //   and a valid power-of-two alignment
        // - the returned pointer is checked for null via NonNull::new
        // - the memory is released in Drop with the identical layout
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| PoolError::invalid_param("arena allocation failed"))?;

        Ok(Self { ptr, total_size })
    }

    #[inline]
    pub(crate) fn total_size(&self) -> usize {
        self.total_size
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// True when a header starting at `offset` lies fully inside the arena
    #[inline]
    pub(crate) fn header_in_bounds(&self, offset: u32) -> bool {
        (offset as usize).checked_add(BLOCK_HEADER_SIZE).is_some_and(|end| end <= self.total_size)
    }

    /// Reads the header at `offset` by value
    pub(crate) fn header(&self, offset: u32) -> BlockHeader {
        debug_assert!(self.header_in_bounds(offset));
        debug_assert!(is_aligned(offset as usize, MEMORY_ALIGNMENT));
        // SAFETY: Copying a header record out of the buffer.
        // - offset + BLOCK_HEADER_SIZE <= total_size (asserted above,
        //   upheld by every caller handing out offsets)
        // - the base allocation is 8-aligned and offsets are multiples of
        //   8, so the read is aligned for BlockHeader
        // - the value is copied out; no reference into the buffer escapes
        unsafe { self.base().add(offset as usize).cast::<BlockHeader>().read() }
    }

    /// Writes the header at `offset`
    pub(crate) fn write_header(&self, offset: u32, header: BlockHeader) {
        debug_assert!(self.header_in_bounds(offset));
        debug_assert!(is_aligned(offset as usize, MEMORY_ALIGNMENT));
        // SAFETY: Same bounds and alignment argument as `header`. The
        // write targets only the 32 header bytes, which are never inside
        // any payload region handed to a caller.
        unsafe {
            self.base().add(offset as usize).cast::<BlockHeader>().write(header);
        }
    }

    /// Clears the magic of the header at `offset`; a poisoned header no
    /// longer denotes a block and must not be revived
    pub(crate) fn poison(&self, offset: u32) {
        let mut header = self.header(offset);
        header.magic = 0;
        self.write_header(offset, header);
    }

    /// Pointer to the payload of the block at `offset`
    pub(crate) fn payload_ptr(&self, offset: u32) -> NonNull<u8> {
        debug_assert!(self.header_in_bounds(offset));
        // SAFETY: offset + BLOCK_HEADER_SIZE <= total_size, so the payload
        // start is in bounds; NonNull because base is non-null.
        unsafe { NonNull::new_unchecked(self.base().add(offset as usize + BLOCK_HEADER_SIZE)) }
    }

    /// Recovers the block offset from a payload pointer
    ///
    /// Returns `None` when the pointer cannot denote a block of this arena
    /// (outside the buffer, or not on the 8-byte grid every header sits
    /// on). A `Some` result is safe to pass to [`Arena::header`]; whether
    /// the header is live is for the caller to decide via the magic.
    pub(crate) fn offset_of_payload(&self, payload: NonNull<u8>) -> Option<u32> {
        let base = self.base() as usize;
        let addr = payload.as_ptr() as usize;
        if addr < base + BLOCK_HEADER_SIZE || addr >= base + self.total_size {
            return None;
        }
        let offset = addr - base - BLOCK_HEADER_SIZE;
        if !is_aligned(offset, MEMORY_ALIGNMENT) {
            return None;
        }
        Some(offset as u32)
    }

    /// Zeroes `len` payload bytes of the block at `offset`
    pub(crate) fn zero_payload(&self, offset: u32, len: usize) {
        debug_assert!(offset as usize + BLOCK_HEADER_SIZE + len <= self.total_size);
        // SAFETY: The payload region [offset + header, offset + header +
        // len) is inside the arena (asserted; len comes from the block's
        // own header). The block just transitioned to used under the pool
        // mutex, so no caller holds its payload yet.
        unsafe {
            ptr::write_bytes(self.base().add(offset as usize + BLOCK_HEADER_SIZE), 0, len);
        }
    }

    /// Offset one past the end of the block at `offset`
    #[inline]
    pub(crate) fn block_end(&self, offset: u32, header: &BlockHeader) -> usize {
        offset as usize + BLOCK_HEADER_SIZE + header.payload_size()
    }

    /// Iterator over `(offset, header)` pairs in physical order
    ///
    /// Stops at the arena end, or early at the first header whose magic is
    /// gone or whose extent leaves the arena. Callers that must tell the
    /// two apart compare the covered bytes against `total_size`.
    pub(crate) fn blocks(&self) -> PhysicalBlocks<'_> {
        PhysicalBlocks {
            arena: self,
            position: 0,
        }
    }

    /// Finds the block physically preceding `offset`
    ///
    /// Walks forward from the arena base following block extents, the way
    /// the layout is defined; there is no back-link to chase. Returns
    /// `None` when `offset` is the first block or the walk detects a
    /// corrupt extent before reaching it.
    pub(crate) fn physical_prev(&self, offset: u32) -> Option<(u32, BlockHeader)> {
        if offset == 0 {
            return None;
        }
        let mut current = 0usize;
        while current < offset as usize {
            let header = self.header(current as u32);
            if !header.is_valid() {
                return None;
            }
            let end = self.block_end(current as u32, &header);
            if end == offset as usize {
                return Some((current as u32, header));
            }
            if end > offset as usize || end > self.total_size {
                return None;
            }
            current = end;
        }
        None
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: Releasing the allocation made in `new`.
        // - ptr came from alloc_zeroed with this exact layout
        // - from_size_align cannot fail here: it succeeded for the same
        //   inputs in `new`
        // - Drop runs exactly once
        unsafe {
            dealloc(
                self.ptr.as_ptr(),
                Layout::from_size_align(self.total_size, MEMORY_ALIGNMENT)
                    .expect("layout validated at construction"),
            );
        }
    }
}

// SAFETY: Arena is Send because it exclusively owns its allocation:
// - ptr is the sole handle to the buffer (released only in Drop)
// - total_size is a primitive
// - no thread-local state
unsafe impl Send for Arena {}

// SAFETY: Arena is Sync because all mutation goes through &self raw-pointer
// writes that the owning pool serializes under its mutex; concurrent client
// writes through handed-out payload pointers target regions disjoint from
// every header the arena touches.
unsafe impl Sync for Arena {}

/// Physical-order block iterator, bounded by the arena extent
pub(crate) struct PhysicalBlocks<'a> {
    arena: &'a Arena,
    position: usize,
}

impl PhysicalBlocks<'_> {
    /// Bytes covered by the blocks yielded so far
    pub(crate) fn covered(&self) -> usize {
        self.position
    }
}

impl Iterator for PhysicalBlocks<'_> {
    type Item = (u32, BlockHeader);

    fn next(&mut self) -> Option<Self::Item> {
        if self.position + BLOCK_HEADER_SIZE > self.arena.total_size {
            return None;
        }
        let offset = self.position as u32;
        let header = self.arena.header(offset);
        if !header.is_valid() {
            return None;
        }
        let end = self.arena.block_end(offset, &header);
        if end > self.arena.total_size {
            return None;
        }
        self.position = end;
        Some((offset, header))
    }
}
