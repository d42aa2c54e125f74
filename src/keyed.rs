//! [`CompositeKeyedPool`]: the per-key multiplexer.
//!
//! Maps a key to a per-key [`crate::pool::CompositePool`], created on
//! first use from a [`crate::factory::KeyedResourceFactory`]. Rather than
//! propagating a "current key" through thread-local state, each per-key
//! pool is built over a [`KeyAdapter`] that closes over its one key and
//! the shared `KeyedResourceFactory`, so the per-key `CompositePool`
//! never needs to know keys exist at all — there is no thread-local to
//! set, clear, or leak across a panic.
//!
//! The `key -> Pool` map has its own `parking_lot::Mutex`, released
//! before any call into a per-key pool's own mutex: the keyed map's lock
//! and a per-key pool's lock are never held at the same time.

use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::eviction::EvictionScheduler;
use crate::factory::{KeyedResourceFactory, ResourceFactory};
use crate::guard::PoolGuard;
use crate::pool::CompositePool;
use crate::tracker::UNKNOWN_ACTIVE_COUNT;

/// Adapts a [`KeyedResourceFactory`] bound to one fixed key into a plain
/// [`ResourceFactory`], so a per-key [`CompositePool`] can be built with
/// no awareness of the keyed layer above it.
struct KeyAdapter<K, T, F> {
    key: K,
    shared: Arc<F>,
    _marker: PhantomData<fn() -> T>,
}

impl<K, T, F> ResourceFactory<T> for KeyAdapter<K, T, F>
where
    K: Send + Sync + 'static,
    T: Send,
    F: KeyedResourceFactory<K, T>,
{
    type Error = F::Error;

    fn create(&self) -> Result<T, Self::Error> {
        self.shared.create(&self.key)
    }

    fn destroy(&self, resource: &mut T) {
        self.shared.destroy(&self.key, resource)
    }

    fn validate(&self, resource: &T) -> bool {
        self.shared.validate(&self.key, resource)
    }

    fn activate(&self, resource: &mut T) -> Result<(), Self::Error> {
        self.shared.activate(&self.key, resource)
    }

    fn passivate(&self, resource: &mut T) -> Result<(), Self::Error> {
        self.shared.passivate(&self.key, resource)
    }
}

type PerKeyPool<K, T, F> = CompositePool<T, KeyAdapter<K, T, F>>;

/// Presents a keyed-pool front end over a family of composite pools, one
/// per key, created lazily.
pub struct CompositeKeyedPool<K, T, F> {
    name: String,
    config: PoolConfig,
    factory: Arc<F>,
    scheduler: Arc<EvictionScheduler>,
    pools: Arc<Mutex<HashMap<K, PerKeyPool<K, T, F>>>>,
    closed: Arc<AtomicBool>,
}

impl<K, T, F> CompositeKeyedPool<K, T, F>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Send + 'static,
    F: KeyedResourceFactory<K, T> + 'static,
{
    pub fn new(name: impl Into<String>, config: PoolConfig, factory: F) -> Self {
        Self {
            name: name.into(),
            config,
            factory: Arc::new(factory),
            scheduler: EvictionScheduler::global(),
            pools: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a handle (cheap `Arc` clone) sharing this instance's
    /// already-created per-key pools and map.
    pub fn handle(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            factory: Arc::clone(&self.factory),
            scheduler: Arc::clone(&self.scheduler),
            pools: Arc::clone(&self.pools),
            closed: Arc::clone(&self.closed),
        }
    }

    /// Same configuration and factory, but an empty `key -> Pool` map and
    /// no shared active-tracking with the original — a resource borrowed
    /// from `self` must never be returned to the fork. Because the key is
    /// threaded through an explicit [`KeyAdapter`] per per-key pool rather
    /// than a thread-local, a fresh adapter is unavoidable here: the
    /// fork's first `borrow(key)` builds its own `KeyAdapter` from
    /// scratch.
    pub fn fork(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            factory: Arc::clone(&self.factory),
            scheduler: Arc::clone(&self.scheduler),
            pools: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn get_or_create(&self, key: &K) -> PoolResult<PerKeyPool<K, T, F>> {
        if let Some(pool) = self.pools.lock().get(key) {
            return Ok(pool.clone());
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::closed(self.name.clone()));
        }
        let adapter = KeyAdapter { key: key.clone(), shared: Arc::clone(&self.factory), _marker: PhantomData };
        let built = CompositePool::with_scheduler(
            self.name.clone(),
            self.config.clone(),
            adapter,
            Arc::clone(&self.scheduler),
        )?;
        let mut pools = self.pools.lock();
        // Another thread may have raced us to creation; keep whichever
        // instance is already installed so there is only ever one pool
        // per key.
        let pool = pools.entry(key.clone()).or_insert(built).clone();
        Ok(pool)
    }

    pub fn borrow(&self, key: &K) -> PoolResult<PoolGuard<T>> {
        self.get_or_create(key)?.borrow()
    }

    pub fn add(&self, key: &K) -> PoolResult<()> {
        self.get_or_create(key)?.add()
    }

    /// Clears idle resources for every known key, without removing any
    /// per-key pool.
    pub fn clear(&self) {
        let pools: Vec<_> = self.pools.lock().values().cloned().collect();
        for pool in pools {
            pool.clear();
        }
    }

    /// Clears idle resources for one key; if that per-key pool then has
    /// zero active resources, it is removed and closed to release
    /// memory.
    pub fn clear_key(&self, key: &K) {
        let pool = self.pools.lock().get(key).cloned();
        let Some(pool) = pool else { return };
        pool.clear();
        if pool.num_active() == 0 {
            let removed = self.pools.lock().remove(key);
            if let Some(removed) = removed {
                removed.close();
            }
        }
    }

    /// Closes every per-key pool and prevents new keys from being
    /// created through this handle (or any [`Self::handle`] sharing it).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let pools: Vec<_> = self.pools.lock().values().cloned().collect();
        for pool in pools {
            pool.close();
        }
    }

    /// Sum of active resources across every created per-key pool, or
    /// [`UNKNOWN_ACTIVE_COUNT`] if any per-key pool uses a `Null`
    /// tracker.
    pub fn num_active(&self) -> i64 {
        let pools: Vec<_> = self.pools.lock().values().cloned().collect();
        let mut total = 0i64;
        for pool in pools {
            let active = pool.num_active();
            if active < 0 {
                return UNKNOWN_ACTIVE_COUNT;
            }
            total += active;
        }
        total
    }

    /// Active count for one key; `0` if that key has never been borrowed.
    pub fn num_active_key(&self, key: &K) -> i64 {
        self.pools.lock().get(key).map(|p| p.num_active()).unwrap_or(0)
    }

    /// Sum of idle resources across every created per-key pool.
    pub fn num_idle(&self) -> usize {
        self.pools.lock().values().map(|p| p.num_idle()).sum()
    }

    /// Idle count for one key; `0` if that key has never been borrowed.
    pub fn num_idle_key(&self, key: &K) -> usize {
        self.pools.lock().get(key).map(|p| p.num_idle()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BorrowPolicy;
    use std::convert::Infallible;
    use std::sync::Mutex as StdMutex;

    /// Key-aware factory that records every key it was asked to build a
    /// resource for, so tests can assert on observed ordering.
    struct RecordingFactory {
        seen: StdMutex<Vec<String>>,
    }

    impl KeyedResourceFactory<String, u64> for RecordingFactory {
        type Error = Infallible;

        fn create(&self, key: &String) -> Result<u64, Self::Error> {
            self.seen.lock().unwrap().push(key.clone());
            Ok(key.len() as u64)
        }

        fn destroy(&self, _key: &String, _resource: &mut u64) {}
    }

    #[test]
    fn keyed_borrow_sees_the_right_key() {
        let keyed = CompositeKeyedPool::new(
            "keyed",
            PoolConfig::default().with_borrow_policy(BorrowPolicy::Fifo),
            RecordingFactory { seen: StdMutex::new(Vec::new()) },
        );
        let _a = keyed.borrow(&"A".to_string()).unwrap();
        let _b = keyed.borrow(&"BB".to_string()).unwrap();
        assert_eq!(*keyed.factory.seen.lock().unwrap(), vec!["A".to_string(), "BB".to_string()]);
    }

    #[test]
    fn per_key_pools_are_independent() {
        let keyed = CompositeKeyedPool::new(
            "keyed",
            PoolConfig::default(),
            RecordingFactory { seen: StdMutex::new(Vec::new()) },
        );
        let a = keyed.borrow(&"A".to_string()).unwrap();
        a.return_resource();
        assert_eq!(keyed.num_idle_key(&"A".to_string()), 1);
        assert_eq!(keyed.num_idle_key(&"B".to_string()), 0);
    }

    #[test]
    fn clear_key_removes_pool_once_it_has_no_active() {
        let keyed = CompositeKeyedPool::new(
            "keyed",
            PoolConfig::default(),
            RecordingFactory { seen: StdMutex::new(Vec::new()) },
        );
        let guard = keyed.borrow(&"A".to_string()).unwrap();
        guard.return_resource();
        assert_eq!(keyed.num_idle_key(&"A".to_string()), 1);
        keyed.clear_key(&"A".to_string());
        assert_eq!(keyed.num_idle_key(&"A".to_string()), 0);
        assert!(!keyed.pools.lock().contains_key(&"A".to_string()));
    }

    #[test]
    fn fork_has_independent_empty_state() {
        let keyed = CompositeKeyedPool::new(
            "keyed",
            PoolConfig::default(),
            RecordingFactory { seen: StdMutex::new(Vec::new()) },
        );
        keyed.borrow(&"A".to_string()).unwrap().return_resource();
        assert_eq!(keyed.num_idle_key(&"A".to_string()), 1);

        let forked = keyed.fork();
        assert_eq!(forked.num_idle_key(&"A".to_string()), 0);
        forked.borrow(&"A".to_string()).unwrap();
        assert_eq!(keyed.num_idle_key(&"A".to_string()), 1);
    }

    #[test]
    fn close_closes_every_created_per_key_pool() {
        let keyed = CompositeKeyedPool::new(
            "keyed",
            PoolConfig::default(),
            RecordingFactory { seen: StdMutex::new(Vec::new()) },
        );
        keyed.borrow(&"A".to_string()).unwrap().return_resource();
        keyed.borrow(&"B".to_string()).unwrap().return_resource();
        keyed.close();
        assert!(matches!(
            keyed.borrow(&"A".to_string()),
            Err(crate::error::PoolError::PoolClosed { .. })
        ));
        assert!(matches!(
            keyed.borrow(&"C".to_string()),
            Err(crate::error::PoolError::PoolClosed { .. })
        ));
    }
}
