//! Client ownership, registries and bulk release

use std::sync::Arc;

use memory_pool::prelude::*;

fn shared_pool(total: usize) -> Arc<MemoryPool> {
    Arc::new(MemoryPool::with_capacity(total, AllocationStrategy::FirstFit).unwrap())
}

#[test]
fn cross_client_release_is_rejected() {
    let pool = shared_pool(64 * 1024);
    let c1 = MemoryClient::new(1, Arc::clone(&pool)).unwrap();
    let c2 = MemoryClient::new(2, Arc::clone(&pool)).unwrap();

    let p1 = c1.alloc(400).unwrap();
    let err = c2.free(p1).unwrap_err();
    assert!(matches!(
        err,
        PoolError::OwnershipViolation {
            owner: 1,
            caller: 2
        }
    ));
    assert_eq!(err.status_code(), -4);

    // The block is still allocated and still releasable by its owner
    assert_eq!(pool.metrics().used_blocks, 1);
    assert_eq!(c1.allocated_count(), 1);
    c1.free(p1).unwrap();
    assert_eq!(pool.metrics().used_blocks, 0);
}

#[test]
fn double_free_is_a_warned_noop() {
    let pool = shared_pool(64 * 1024);
    let client = MemoryClient::new(1, Arc::clone(&pool)).unwrap();

    let payload = client.alloc(400).unwrap();
    client.free(payload).unwrap();
    let before = pool.metrics();

    // Second release succeeds without touching any counter
    client.free(payload).unwrap();
    let after = pool.metrics();
    assert_eq!(after.free_count, before.free_count);
    assert_eq!(after.used_memory, before.used_memory);
    assert_eq!(after.free_blocks, before.free_blocks);
}

#[test]
fn free_all_releases_everything() {
    let pool = shared_pool(256 * 1024);
    let client = MemoryClient::new(4, Arc::clone(&pool)).unwrap();

    for size in [64, 128, 256, 512, 1024] {
        client.alloc(size).unwrap();
    }
    assert_eq!(client.allocated_count(), 5);
    assert_eq!(pool.metrics().used_blocks, 5);

    client.free_all();
    assert_eq!(client.allocated_count(), 0);
    let metrics = pool.metrics();
    assert_eq!(metrics.used_blocks, 0);
    assert_eq!(metrics.free_blocks, 1);
    pool.validate().expect("bulk release kept the layout sound");
}

#[test]
fn free_all_skips_blocks_absorbed_behind_its_back() {
    let pool = shared_pool(64 * 1024);
    let client = MemoryClient::new(1, Arc::clone(&pool)).unwrap();

    let p1 = client.alloc(128).unwrap();
    let p2 = client.alloc(128).unwrap();
    let _guard = client.alloc(128).unwrap();

    // Release both through the pool directly, leaving the registry stale.
    // p2 is absorbed into p1's region, poisoning its header.
    pool.free(p1, 1).unwrap();
    pool.free(p2, 1).unwrap();

    // The stale entries are skipped silently; the live one is released
    client.free_all();
    assert_eq!(client.allocated_count(), 0);
    assert_eq!(pool.metrics().used_blocks, 0);
    assert_eq!(pool.metrics().free_blocks, 1);
    pool.validate().expect("stale registry entries left no damage");
}

#[test]
fn client_drop_returns_blocks_to_the_pool() {
    let pool = shared_pool(64 * 1024);
    {
        let client = MemoryClient::new(2, Arc::clone(&pool)).unwrap();
        for _ in 0..8 {
            client.alloc(512).unwrap();
        }
        assert_eq!(pool.metrics().used_blocks, 8);
    }
    assert_eq!(pool.metrics().used_blocks, 0);
    assert_eq!(pool.metrics().free_blocks, 1);
}

#[test]
fn reassign_moves_the_client_between_pools() {
    let old_pool = shared_pool(64 * 1024);
    let new_pool = shared_pool(64 * 1024);
    let client = MemoryClient::new(5, Arc::clone(&old_pool)).unwrap();

    client.alloc(1024).unwrap();
    client.alloc(1024).unwrap();
    assert_eq!(old_pool.metrics().used_blocks, 2);

    client.reassign_pool(Arc::clone(&new_pool)).unwrap();
    // Everything went back to the old pool before the switch
    assert_eq!(old_pool.metrics().used_blocks, 0);
    assert_eq!(client.allocated_count(), 0);
    assert!(Arc::ptr_eq(&client.pool(), &new_pool));

    client.alloc(256).unwrap();
    assert_eq!(new_pool.metrics().used_blocks, 1);
    assert_eq!(old_pool.metrics().used_blocks, 0);
}

#[test]
fn client_ids_and_getters() {
    let pool = shared_pool(4 * 1024);
    let client = MemoryClient::new(11, Arc::clone(&pool)).unwrap();
    assert_eq!(client.id(), 11);
    assert_eq!(client.allocated_count(), 0);
    assert!(Arc::ptr_eq(&client.pool(), &pool));

    assert!(MemoryClient::new(-3, pool).is_err());
}

#[test]
fn pool_outlives_destroy_while_clients_hold_it() {
    let pool = shared_pool(64 * 1024);
    let client = MemoryClient::new(1, Arc::clone(&pool)).unwrap();
    client.alloc(128).unwrap();

    // Destroying with outstanding blocks warns but proceeds; the client's
    // later operations fail cleanly instead of touching freed memory
    pool.destroy();
    assert!(matches!(client.alloc(64), Err(PoolError::PoolNotInitialized)));
    client.free_all();
    assert_eq!(client.allocated_count(), 0);
}
