//! Property tests for the invariants that must hold no matter what
//! sequence of borrow/return/invalidate operations a caller performs:
//! the active count always matches what's actually checked out, and the
//! idle buffer never grows past its configured cap.

use std::convert::Infallible;

use composite_pool::{CompositePool, PoolConfig, PoolGuard, ResourceFactory};
use proptest::prelude::*;

struct Counter;

impl ResourceFactory<u64> for Counter {
    type Error = Infallible;
    fn create(&self) -> Result<u64, Self::Error> {
        Ok(0)
    }
    fn destroy(&self, _resource: &mut u64) {}
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Borrow,
    Return,
    Invalidate,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Borrow), Just(Op::Return), Just(Op::Invalidate)]
}

proptest! {
    #[test]
    fn active_count_matches_outstanding_guards_and_idle_respects_cap(
        ops in prop::collection::vec(op_strategy(), 0..200),
        max_idle in 1usize..6,
    ) {
        let pool = CompositePool::new(
            "proptest-pool",
            PoolConfig::default().with_max_idle(Some(max_idle)),
            Counter,
        )
        .unwrap();

        let mut held: Vec<PoolGuard<u64>> = Vec::new();

        for op in ops {
            match op {
                Op::Borrow => {
                    held.push(pool.borrow().unwrap());
                }
                Op::Return => {
                    if let Some(guard) = held.pop() {
                        guard.return_resource();
                    }
                }
                Op::Invalidate => {
                    if let Some(guard) = held.pop() {
                        guard.invalidate();
                    }
                }
            }
            prop_assert_eq!(pool.num_active(), held.len() as i64);
            prop_assert!(pool.num_idle() <= max_idle);
        }

        for guard in held {
            guard.return_resource();
        }
        prop_assert_eq!(pool.num_active(), 0);
        prop_assert!(pool.num_idle() <= max_idle);
    }
}
