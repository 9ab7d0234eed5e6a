//! Pool clients
//!
//! A [`MemoryClient`] is a lightweight identified handle onto a shared
//! pool. The pool owns all memory; the client keeps a registry of the
//! payloads it obtained so every outstanding block can be released in
//! bulk when the client goes away or moves to another pool.
//!
//! Lock order is client registry first, pool mutex second; the pool never
//! calls back into client code, so the order cannot invert.

use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{PoolError, PoolResult};
use crate::pool::MemoryPool;

/// Identified user of a [`MemoryPool`]
///
/// Multiple clients may share one pool, and a single client may be used
/// from several threads; the registry has its own lock and every memory
/// operation is serialized by the pool. Dropping the client releases all
/// blocks it still holds.
pub struct MemoryClient {
    id: i64,
    inner: Mutex<ClientInner>,
}

/// Registry state guarded by the client mutex
struct ClientInner {
    pool: Arc<MemoryPool>,
    /// Payload addresses currently held, keyed for O(1) insert/remove
    blocks: HashSet<usize>,
}

impl MemoryClient {
    /// Creates a client bound to `pool`
    ///
    /// # Errors
    /// `InvalidParam` for a negative id.
    pub fn new(id: i64, pool: Arc<MemoryPool>) -> PoolResult<Self> {
        if id < 0 {
            return Err(PoolError::invalid_param(format!("negative client id {id}")));
        }
        info!(id, "client created");
        Ok(Self {
            id,
            inner: Mutex::new(ClientInner {
                pool,
                blocks: HashSet::new(),
            }),
        })
    }

    /// Client id
    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The pool this client currently allocates from
    pub fn pool(&self) -> Arc<MemoryPool> {
        Arc::clone(&self.inner.lock().pool)
    }

    /// Number of blocks currently recorded in the registry
    pub fn allocated_count(&self) -> usize {
        self.inner.lock().blocks.len()
    }

    /// Allocates `size` bytes from the pool under this client's id
    ///
    /// On success the payload is recorded in the registry. If recording
    /// itself fails the block is returned to the pool, so no memory is
    /// lost to bookkeeping.
    pub fn alloc(&self, size: usize) -> PoolResult<NonNull<u8>> {
        let mut inner = self.inner.lock();
        let payload = inner.pool.alloc(size, self.id)?;

        if let Err(reserve_err) = inner.blocks.try_reserve(1) {
            error!(id = self.id, %reserve_err, "client registry growth failed");
            if let Err(free_err) = inner.pool.free(payload, self.id) {
                error!(id = self.id, %free_err, "rollback of unrecorded block failed");
            }
            return Err(PoolError::invalid_param("client registry growth failed"));
        }
        inner.blocks.insert(payload.as_ptr() as usize);

        debug!(id = self.id, payload = ?payload, "client recorded block");
        Ok(payload)
    }

    /// Releases `payload` through the pool and drops it from the registry
    ///
    /// The registry entry is removed whenever the pool reports success,
    /// which includes the warned double-free no-op.
    pub fn free(&self, payload: NonNull<u8>) -> PoolResult<()> {
        let mut inner = self.inner.lock();
        let result = inner.pool.free(payload, self.id);
        if result.is_ok() {
            inner.blocks.remove(&(payload.as_ptr() as usize));
            debug!(id = self.id, payload = ?payload, "client dropped block record");
        }
        result
    }

    /// Releases every block this client still holds
    ///
    /// Entries the pool rejects are skipped: a block may have been handed
    /// back through the pool directly and absorbed by coalescing since it
    /// was recorded, and the pool itself may already be gone. Either way
    /// the registry ends up empty.
    pub fn free_all(&self) {
        let mut inner = self.inner.lock();
        release_all(&mut inner, self.id);
    }

    /// Moves the client to `new_pool`, releasing everything it holds in
    /// the old one first
    pub fn reassign_pool(&self, new_pool: Arc<MemoryPool>) -> PoolResult<()> {
        let mut inner = self.inner.lock();
        release_all(&mut inner, self.id);
        inner.pool = new_pool;
        info!(id = self.id, "client reassigned to a new pool");
        Ok(())
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        release_all(inner, self.id);
        debug!(id = self.id, "client destroyed");
    }
}

impl core::fmt::Debug for MemoryClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryClient")
            .field("id", &self.id)
            .field("allocated_count", &self.inner.lock().blocks.len())
            .finish()
    }
}

/// Drains the registry, releasing each entry through the pool
///
/// Shared by `free_all`, `reassign_pool` and `Drop`; all of them already
/// hold the client lock, so this takes the inner state directly.
fn release_all(inner: &mut ClientInner, id: i64) {
    if inner.blocks.is_empty() {
        return;
    }
    info!(id, count = inner.blocks.len(), "client releasing all blocks");

    let ClientInner { pool, blocks } = inner;
    for address in blocks.drain() {
        let Some(payload) = NonNull::new(address as *mut u8) else {
            continue;
        };
        if let Err(err) = pool.free(payload, id) {
            debug!(id, address, %err, "skipped stale registry entry");
        }
    }
}
