//! Property tests: random operation sequences must keep the structural
//! invariants intact after every step

use std::ptr::NonNull;

use proptest::prelude::*;

use memory_pool::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Alloc { size: usize, client: i64 },
    Free { index: usize },
    Switch { strategy: AllocationStrategy },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..1024, 0i64..4).prop_map(|(size, client)| Op::Alloc { size, client }),
        2 => any::<usize>().prop_map(|index| Op::Free { index }),
        1 => (0u8..4).prop_map(|pick| Op::Switch {
            strategy: match pick {
                0 => AllocationStrategy::FirstFit,
                1 => AllocationStrategy::BestFit,
                2 => AllocationStrategy::WorstFit,
                _ => AllocationStrategy::NextFit,
            }
        }),
    ]
}

proptest! {
    #[test]
    fn random_churn_preserves_invariants(ops in proptest::collection::vec(op_strategy(), 1..120)) {
        let pool = MemoryPool::with_capacity(16 * 1024, AllocationStrategy::FirstFit).unwrap();
        let mut held: Vec<(NonNull<u8>, i64)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc { size, client } => {
                    // Exhaustion is an expected outcome, not a failure
                    if let Ok(payload) = pool.alloc(size, client) {
                        held.push((payload, client));
                    }
                }
                Op::Free { index } => {
                    if !held.is_empty() {
                        let (payload, client) = held.swap_remove(index % held.len());
                        prop_assert!(pool.free(payload, client).is_ok());
                    }
                }
                Op::Switch { strategy } => {
                    prop_assert!(pool.set_strategy(strategy).is_ok());
                }
            }

            prop_assert!(pool.check());
            prop_assert!(pool.validate().is_ok());
            let metrics = pool.metrics();
            prop_assert_eq!(metrics.used_memory + metrics.free_memory, metrics.total_memory);
            prop_assert_eq!(metrics.used_blocks, held.len());
        }

        // Releasing everything must collapse the arena back to one region
        for (payload, client) in held.drain(..) {
            prop_assert!(pool.free(payload, client).is_ok());
        }
        let metrics = pool.metrics();
        prop_assert_eq!(metrics.used_blocks, 0);
        prop_assert_eq!(metrics.free_blocks, 1);
        prop_assert_eq!(metrics.largest_free_block, metrics.total_memory);
    }

    #[test]
    fn wrong_owner_never_mutates_state(size in 1usize..512) {
        let pool = MemoryPool::with_capacity(8 * 1024, AllocationStrategy::FirstFit).unwrap();
        let payload = pool.alloc(size, 1).unwrap();
        let before = pool.metrics();

        let result = pool.free(payload, 2);
        let is_ownership_violation = matches!(
            result,
            Err(PoolError::OwnershipViolation { owner: 1, caller: 2 })
        );
        prop_assert!(is_ownership_violation);

        let after = pool.metrics();
        prop_assert_eq!(before.used_memory, after.used_memory);
        prop_assert_eq!(before.used_blocks, after.used_blocks);
        prop_assert_eq!(before.free_count, after.free_count);

        prop_assert!(pool.free(payload, 1).is_ok());
    }
}
