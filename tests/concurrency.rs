//! Integration tests that spawn real OS threads to exercise behavior
//! that only shows up under genuine concurrency: `WaitOnLimit` wakeups
//! and keyed borrows racing to create the same per-key pool.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use composite_pool::{
    BorrowPolicy, CompositeKeyedPool, CompositePool, KeyedResourceFactory, LimitPolicy,
    PoolConfig, ResourceFactory,
};

struct Ticket;

impl ResourceFactory<u64> for Ticket {
    type Error = Infallible;
    fn create(&self) -> Result<u64, Self::Error> {
        Ok(0)
    }
    fn destroy(&self, _resource: &mut u64) {}
}

#[test]
fn many_waiters_all_eventually_get_served() {
    let pool = CompositePool::new(
        "waiters",
        PoolConfig::default()
            .with_max_active(Some(1))
            .with_limit_policy(LimitPolicy::Wait)
            .with_tracking_policy(composite_pool::TrackingPolicy::Simple),
        Ticket,
    )
    .unwrap();

    let held = pool.borrow().unwrap();

    let served = Arc::new(AtomicU64::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let served = Arc::clone(&served);
            std::thread::spawn(move || {
                let guard = pool.borrow().expect("wait should eventually succeed");
                served.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                guard.return_resource();
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(20));
    held.return_resource();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(served.load(Ordering::SeqCst), 8);
}

struct PerKeyCounter {
    created: Arc<AtomicU64>,
}

impl KeyedResourceFactory<String, u64> for PerKeyCounter {
    type Error = Infallible;

    fn create(&self, _key: &String) -> Result<u64, Self::Error> {
        Ok(self.created.fetch_add(1, Ordering::SeqCst))
    }

    fn destroy(&self, _key: &String, _resource: &mut u64) {}
}

#[test]
fn concurrent_first_borrows_create_exactly_one_pool_per_key() {
    let created = Arc::new(AtomicU64::new(0));
    let keyed = Arc::new(CompositeKeyedPool::new(
        "keyed-race",
        PoolConfig::default().with_borrow_policy(BorrowPolicy::Fifo),
        PerKeyCounter { created: Arc::clone(&created) },
    ));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let keyed = Arc::clone(&keyed);
            std::thread::spawn(move || {
                let guard = keyed.borrow(&"shared-key".to_string()).unwrap();
                guard.return_resource();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let idle = keyed.num_idle_key(&"shared-key".to_string());
    assert_eq!(keyed.num_active_key(&"shared-key".to_string()), 0, "no resource left checked out");
    assert!(idle >= 1 && idle <= 8, "idle count must respect the configured cap: got {idle}");
}
