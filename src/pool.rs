//! [`CompositePool`]: the orchestrator.
//!
//! Owns the idle buffer (via [`crate::lender::Lender`]), the active
//! bookkeeping (via [`crate::tracker::Tracker`]), the admission policy
//! (via [`crate::manager::Manager`]), and the factory. A single
//! `parking_lot::Mutex` guards the idle buffer and the tracker's
//! mutative calls, with a paired `Condvar` for `WaitOnLimit`, following
//! the classic `Mutex` + `Condvar` wait-and-recheck loop for a blocking
//! pool borrow.
//!
//! Factory callbacks run outside the mutex wherever possible:
//! `activate`/`validate` during the idle drain and during `create` are
//! only briefly under the lock to read/update state; `passivate` and
//! `validate` on return run fully unlocked; `destroy` always runs
//! unlocked. There is no deferred-destroy timer — `destroy` just runs
//! after the mutex is released, on whichever thread reached that code
//! path (the borrowing thread for a failed drain candidate, the
//! returning thread for a failed return, or the shared
//! [`crate::eviction::EvictionScheduler`]'s thread for a timed
//! eviction).

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

use crate::builder;
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::eviction::EvictionScheduler;
use crate::factory::ResourceFactory;
use crate::guard::{GuardOwner, PoolGuard};
use crate::lender::Lender;
use crate::manager::{BaseDecision, LimitDecision, Manager};
use crate::tracker::Tracker;

#[cfg(feature = "stats")]
use crate::stats::{PoolStats, PoolStatsSnapshot};

#[cfg(feature = "stats")]
use crate::health::PoolHealthSnapshot;

struct PoolState<T> {
    open: bool,
    lender: Lender<T>,
    tracker: Tracker,
    manager: Manager,
}

struct PoolCore<T, F> {
    name: String,
    factory: F,
    config: PoolConfig,
    state: Mutex<PoolState<T>>,
    capacity_cv: Condvar,
    self_weak: Weak<PoolCore<T, F>>,
    /// Strong handles for this pool's eviction-scheduler registrations;
    /// their mere existence is what keeps the scheduler's `Weak`s alive.
    /// Filled in once, right after the `Arc` is built — `new_cyclic`
    /// leaves the weak count at 2 the moment it returns (`self_weak` is
    /// itself a witness), so there is no unique-ownership window to
    /// reach through with `Arc::get_mut`; interior mutability sidesteps
    /// that entirely.
    _eviction_tokens: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
    #[cfg(feature = "stats")]
    stats: PoolStats,
}

/// A composable object pool assembled from a Lender, a Manager, a
/// Tracker, and a factory. Cheap to clone (an `Arc` underneath); every
/// clone shares the same idle buffer, tracker, and mutex.
pub struct CompositePool<T, F> {
    core: Arc<PoolCore<T, F>>,
}

impl<T, F> Clone for CompositePool<T, F> {
    fn clone(&self) -> Self {
        Self { core: Arc::clone(&self.core) }
    }
}

enum WaitOutcome {
    Retry,
    TimedOut(Duration),
    Closed,
}

impl<T, F> CompositePool<T, F>
where
    T: Send + 'static,
    F: ResourceFactory<T> + Send + Sync + 'static,
{
    /// Build a pool from a validated [`PoolConfig`], using the shared
    /// process-wide [`EvictionScheduler`].
    pub fn new(name: impl Into<String>, config: PoolConfig, factory: F) -> PoolResult<Self> {
        Self::with_scheduler(name, config, factory, EvictionScheduler::global())
    }

    /// As [`Self::new`], but against an explicit scheduler — used by
    /// [`crate::keyed::CompositeKeyedPool`] so every per-key pool shares
    /// one timer, and by tests that want an isolated scheduler.
    pub fn with_scheduler(
        name: impl Into<String>,
        config: PoolConfig,
        factory: F,
        scheduler: Arc<EvictionScheduler>,
    ) -> PoolResult<Self> {
        builder::validate(&config)?;
        let name = name.into();
        let lender = Lender::new(config.borrow_policy)
            .with_soft_bound(soft_bound_for(&config))
            .with_idle_ttl(config.evict_idle_after)
            .with_invalid_every(config.evict_invalid_every);
        let tracker = tracker_for(config.tracking_policy);
        let manager = Manager::new(&config);

        let core = Arc::new_cyclic(|weak| PoolCore {
            name,
            factory,
            state: Mutex::new(PoolState { open: true, lender, tracker, manager }),
            capacity_cv: Condvar::new(),
            self_weak: weak.clone(),
            _eviction_tokens: Mutex::new(Vec::new()),
            config,
            #[cfg(feature = "stats")]
            stats: PoolStats::default(),
        });

        let tokens = register_eviction_tasks(&core, &scheduler);
        *core._eviction_tokens.lock() = tokens;

        Ok(Self { core })
    }

    /// Borrow a resource.
    pub fn borrow(&self) -> PoolResult<PoolGuard<T>> {
        self.core.borrow()
    }

    /// Create, passivate, and idle a brand-new resource.
    pub fn add(&self) -> PoolResult<()> {
        self.core.add()
    }

    /// Drain and destroy every idle resource.
    pub fn clear(&self) {
        self.core.clear();
    }

    /// Close the pool: further `borrow`/`add` fail, idle is drained, and
    /// waiters are woken with `PoolClosed`.
    ///
    /// Idempotent.
    pub fn close(&self) {
        self.core.close();
    }

    pub fn is_closed(&self) -> bool {
        !self.core.state.lock().open
    }

    /// Number of currently-borrowed resources, or
    /// [`crate::tracker::UNKNOWN_ACTIVE_COUNT`] for a `Null` tracker.
    pub fn num_active(&self) -> i64 {
        self.core.num_active()
    }

    /// Number of idle resources.
    pub fn num_idle(&self) -> usize {
        self.core.num_idle()
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.core.stats.snapshot()
    }

    #[cfg(feature = "stats")]
    pub fn health(&self) -> PoolHealthSnapshot {
        self.core.health()
    }
}

fn soft_bound_for(config: &PoolConfig) -> Option<usize> {
    use crate::config::BorrowPolicy::{SoftFifo, SoftLifo};
    if matches!(config.borrow_policy, SoftFifo | SoftLifo) {
        Some(config.max_idle.unwrap_or(16))
    } else {
        None
    }
}

fn tracker_for(policy: crate::config::TrackingPolicy) -> Tracker {
    use crate::config::TrackingPolicy::*;
    match policy {
        Simple => Tracker::simple(),
        Null => Tracker::null(),
        Reference => Tracker::reference(),
        Debug => Tracker::debug(),
    }
}

/// Wires the Lender's idle-timeout and periodic invalid-revalidation
/// sweeps into the shared scheduler. The invalid-revalidation task
/// installs whenever `evict_invalid_every` is set, independent of
/// whether `evict_idle_after` is also set.
fn register_eviction_tasks<T, F>(
    core: &Arc<PoolCore<T, F>>,
    scheduler: &Arc<EvictionScheduler>,
) -> Vec<Arc<dyn Fn() + Send + Sync>>
where
    T: Send + 'static,
    F: ResourceFactory<T> + Send + Sync + 'static,
{
    let mut tokens = Vec::new();

    if let Some(ttl) = core.config.evict_idle_after {
        let weak = Arc::downgrade(core);
        let token: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            let Some(core) = weak.upgrade() else { return };
            core.run_idle_eviction();
        });
        scheduler.register(ttl, Arc::downgrade(&token));
        tokens.push(token);
    }

    if let Some(every) = core.config.evict_invalid_every {
        let weak = Arc::downgrade(core);
        let token: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            let Some(core) = weak.upgrade() else { return };
            core.run_invalid_eviction();
        });
        scheduler.register(every, Arc::downgrade(&token));
        tokens.push(token);
    }

    tokens
}

impl<T, F> PoolCore<T, F>
where
    T: Send + 'static,
    F: ResourceFactory<T> + Send + Sync + 'static,
{
    fn run_idle_eviction(&self) {
        let mut state = self.state.lock();
        if !state.open {
            return;
        }
        let report = state.lender.evict_idle();
        drop(state);
        for mut resource in report.evicted {
            #[cfg(feature = "logging")]
            trace!(pool = %self.name, "idle-timeout eviction destroying resource");
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
        }
    }

    fn run_invalid_eviction(&self) {
        let factory = &self.factory;
        let mut state = self.state.lock();
        if !state.open {
            return;
        }
        let destroyed = state.lender.evict_invalid(|resource| {
            if factory.activate(resource).is_err() {
                return false;
            }
            let ok = factory.validate(resource);
            if ok && factory.passivate(resource).is_err() {
                return false;
            }
            ok
        });
        drop(state);
        for mut resource in destroyed {
            #[cfg(feature = "logging")]
            trace!(pool = %self.name, "periodic re-validation destroying invalid idle resource");
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
        }
    }

    fn borrow(&self) -> PoolResult<PoolGuard<T>> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PoolError::closed(self.name.clone()));
        }

        #[cfg(feature = "stats")]
        self.stats.record_borrow();

        let mut first_drain_error: Option<PoolError> = None;

        loop {
            // The active-count cap gates every way a borrow can be
            // satisfied, idle hit or fresh creation alike — an idle
            // candidate still raises `num_active` once handed out, so
            // checking this only on the Grow path (after the idle drain)
            // would let an idle hit push the pool past `max_active`.
            match state.manager.check_active_limit(state.tracker.borrowed()) {
                LimitDecision::FailNow => {
                    #[cfg(feature = "stats")]
                    self.stats.record_exhausted();
                    return Err(PoolError::exhausted(self.name.clone(), first_drain_error));
                }
                LimitDecision::Wait { deadline } => match self.wait_for_capacity(&mut state, deadline) {
                    WaitOutcome::Retry => continue,
                    WaitOutcome::TimedOut(waited) => {
                        #[cfg(feature = "stats")]
                        self.stats.record_exhausted();
                        return Err(PoolError::exhausted_after_timeout(self.name.clone(), waited));
                    }
                    WaitOutcome::Closed => return Err(PoolError::closed(self.name.clone())),
                },
                LimitDecision::Proceed => {}
            }

            while let Some(mut candidate) = state.lender.poll() {
                drop(state);
                let start = Instant::now();
                let activation = self.factory.activate(&mut candidate);
                let elapsed = start.elapsed();
                state = self.state.lock();
                state.manager.record_activation_sample(elapsed);

                if let Err(err) = activation {
                    drop(state);
                    self.factory.destroy(&mut candidate);
                    #[cfg(feature = "stats")]
                    self.stats.record_destroy();
                    if first_drain_error.is_none() {
                        first_drain_error = Some(PoolError::factory(err));
                    }
                    state = self.state.lock();
                    continue;
                }
                if !self.factory.validate(&candidate) {
                    drop(state);
                    self.factory.destroy(&mut candidate);
                    #[cfg(feature = "stats")]
                    self.stats.record_destroy();
                    state = self.state.lock();
                    continue;
                }

                #[cfg(feature = "stats")]
                self.stats.record_idle_hit();
                return Ok(self.finish_borrow(state, candidate));
            }

            match state.manager.on_idle_exhausted() {
                BaseDecision::Fail => {
                    #[cfg(feature = "stats")]
                    self.stats.record_exhausted();
                    return Err(PoolError::exhausted(self.name.clone(), first_drain_error));
                }
                BaseDecision::Grow => {
                    #[cfg(feature = "stats")]
                    self.stats.record_idle_miss();
                    drop(state);
                    let start = Instant::now();
                    let created = self.factory.create();
                    let elapsed = start.elapsed();
                    state = self.state.lock();
                    state.manager.record_creation_sample(elapsed);

                    return match created {
                        Ok(resource) => {
                            #[cfg(feature = "stats")]
                            self.stats.record_create();
                            let should_prefill = state.manager.should_prefill();
                            let guard = self.finish_borrow(state, resource);
                            if should_prefill {
                                self.spawn_prefill();
                            }
                            Ok(guard)
                        }
                        Err(err) => Err(PoolError::factory(err)),
                    };
                }
            }
        }
    }

    fn finish_borrow(&self, mut state: MutexGuard<'_, PoolState<T>>, resource: T) -> PoolGuard<T> {
        let handle = state.tracker.register();
        #[cfg(feature = "stats")]
        self.stats.observe_active(state.tracker.borrowed());
        drop(state);
        #[cfg(feature = "logging")]
        debug!(pool = %self.name, "borrowed resource");
        let owner: Weak<dyn GuardOwner<T>> = self.self_weak.clone();
        PoolGuard::new(resource, handle, owner)
    }

    /// Fire off a background creation to hide the next borrower's
    /// latency, only when there's idle room for it to land in.
    fn spawn_prefill(&self) {
        let Some(strong) = self.self_weak.upgrade() else { return };
        std::thread::spawn(move || {
            {
                let state = strong.state.lock();
                if !state.open || state.manager.idle_over_cap(state.lender.len()) {
                    return;
                }
            }
            let Ok(mut resource) = strong.factory.create() else { return };
            #[cfg(feature = "stats")]
            strong.stats.record_create();
            if strong.factory.passivate(&mut resource).is_err() {
                strong.factory.destroy(&mut resource);
                #[cfg(feature = "stats")]
                strong.stats.record_destroy();
                return;
            }
            let mut state = strong.state.lock();
            if !state.open || state.manager.idle_over_cap(state.lender.len()) {
                drop(state);
                strong.factory.destroy(&mut resource);
                #[cfg(feature = "stats")]
                strong.stats.record_destroy();
                return;
            }
            let evicted = state.lender.offer(resource);
            drop(state);
            strong.capacity_cv.notify_one();
            if let Some(mut evicted) = evicted {
                strong.factory.destroy(&mut evicted);
                #[cfg(feature = "stats")]
                strong.stats.record_destroy();
            }
        });
    }

    fn wait_for_capacity(&self, state: &mut MutexGuard<'_, PoolState<T>>, deadline: Option<Duration>) -> WaitOutcome {
        if !state.open {
            return WaitOutcome::Closed;
        }
        let waited_start = Instant::now();
        match deadline {
            None => {
                self.capacity_cv.wait(state);
            }
            Some(d) => {
                let result = self.capacity_cv.wait_for(state, d);
                if result.timed_out() {
                    return WaitOutcome::TimedOut(waited_start.elapsed());
                }
            }
        }
        if !state.open {
            WaitOutcome::Closed
        } else {
            WaitOutcome::Retry
        }
    }

    fn add(&self) -> PoolResult<()> {
        {
            let state = self.state.lock();
            if !state.open {
                return Err(PoolError::closed(self.name.clone()));
            }
        }
        let mut resource = self.factory.create().map_err(PoolError::factory)?;
        #[cfg(feature = "stats")]
        self.stats.record_create();
        if let Err(err) = self.factory.passivate(&mut resource) {
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
            return Err(PoolError::factory(err));
        }

        let mut state = self.state.lock();
        if !state.open {
            drop(state);
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
            return Err(PoolError::closed(self.name.clone()));
        }
        let culled = if state.manager.idle_over_cap(state.lender.len()) {
            state.lender.pop_least_desirable()
        } else {
            None
        };
        let soft_evicted = state.lender.offer(resource);
        #[cfg(feature = "stats")]
        self.stats.observe_idle(state.lender.len());
        drop(state);
        self.capacity_cv.notify_one();

        for mut resource in culled.into_iter().chain(soft_evicted) {
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
        }
        Ok(())
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        let mut drained = Vec::new();
        while let Some(resource) = state.lender.poll() {
            drained.push(resource);
        }
        drop(state);
        for mut resource in drained {
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
        }
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if !state.open {
            return;
        }
        state.open = false;
        let mut drained = Vec::new();
        while let Some(resource) = state.lender.poll() {
            drained.push(resource);
        }
        drop(state);
        for mut resource in drained {
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
        }
        self.capacity_cv.notify_all();
        #[cfg(feature = "logging")]
        debug!(pool = %self.name, "pool closed");
    }

    fn num_active(&self) -> i64 {
        let mut state = self.state.lock();
        state.tracker.sweep();
        state.tracker.borrowed()
    }

    fn num_idle(&self) -> usize {
        self.state.lock().lender.len()
    }

    #[cfg(feature = "stats")]
    fn health(&self) -> PoolHealthSnapshot {
        let mut state = self.state.lock();
        state.tracker.sweep();
        let active = state.tracker.borrowed();
        let lost = state.tracker.lost_count();
        let idle = state.lender.len();
        drop(state);
        let snap = self.stats.snapshot();
        PoolHealthSnapshot::new(snap.borrows, snap.exhausted, lost, active, idle)
    }
}

impl<T, F> GuardOwner<T> for PoolCore<T, F>
where
    T: Send + 'static,
    F: ResourceFactory<T> + Send + Sync + 'static,
{
    fn complete_return(&self, mut resource: T, handle: crate::tracker::TrackerHandle) {
        // passivate/validate run unlocked; failure invalidates instead of
        // returning the resource to idle, and never propagates to the
        // caller — return never surfaces factory errors.
        if self.config.validate_on_return && !self.factory.validate(&resource) {
            self.complete_invalidate(resource, handle);
            return;
        }
        if let Err(_err) = self.factory.passivate(&mut resource) {
            self.complete_invalidate(resource, handle);
            return;
        }

        let mut state = self.state.lock();
        let _ = state.tracker.unregister(&handle);
        #[cfg(feature = "stats")]
        self.stats.record_return();

        if !state.open {
            drop(state);
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
            self.capacity_cv.notify_one();
            return;
        }

        let culled = if state.manager.idle_over_cap(state.lender.len()) {
            state.lender.pop_least_desirable()
        } else {
            None
        };
        let soft_evicted = state.lender.offer(resource);
        #[cfg(feature = "stats")]
        self.stats.observe_idle(state.lender.len());
        drop(state);
        self.capacity_cv.notify_one();

        for mut resource in culled.into_iter().chain(soft_evicted) {
            self.factory.destroy(&mut resource);
            #[cfg(feature = "stats")]
            self.stats.record_destroy();
        }
    }

    fn complete_invalidate(&self, mut resource: T, handle: crate::tracker::TrackerHandle) {
        {
            let mut state = self.state.lock();
            let _ = state.tracker.unregister(&handle);
        }
        #[cfg(feature = "stats")]
        self.stats.record_invalidation();
        self.factory.destroy(&mut resource);
        #[cfg(feature = "stats")]
        self.stats.record_destroy();
        self.capacity_cv.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BorrowPolicy, ExhaustionPolicy, LimitPolicy, TrackingPolicy};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingFactory {
        next_id: AtomicU64,
        creates: AtomicU64,
        destroys: AtomicU64,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self { next_id: AtomicU64::new(0), creates: AtomicU64::new(0), destroys: AtomicU64::new(0) }
        }
    }

    impl ResourceFactory<u64> for CountingFactory {
        type Error = Infallible;

        fn create(&self) -> Result<u64, Self::Error> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
        }

        fn destroy(&self, _resource: &mut u64) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pool(config: PoolConfig) -> CompositePool<u64, CountingFactory> {
        CompositePool::new("test", config, CountingFactory::new()).unwrap()
    }

    #[test]
    fn lifo_grow_hands_back_most_recent() {
        let p = pool(PoolConfig::default().with_borrow_policy(BorrowPolicy::Lifo));
        let r0 = p.borrow().unwrap();
        let r1 = p.borrow().unwrap();
        let v0 = *r0;
        let v1 = *r1;
        r0.return_resource();
        r1.return_resource();
        let r2 = p.borrow().unwrap();
        assert_eq!(*r2, v1);
        let _ = v0;
    }

    #[test]
    fn fifo_grow_hands_back_oldest() {
        let p = pool(PoolConfig::default().with_borrow_policy(BorrowPolicy::Fifo));
        let r0 = p.borrow().unwrap();
        let r1 = p.borrow().unwrap();
        let v0 = *r0;
        r0.return_resource();
        r1.return_resource();
        let r2 = p.borrow().unwrap();
        assert_eq!(*r2, v0);
    }

    #[test]
    fn fail_on_empty() {
        let p = pool(
            PoolConfig::default()
                .with_borrow_policy(BorrowPolicy::Fifo)
                .with_exhaustion_policy(ExhaustionPolicy::Fail)
                .with_max_idle(Some(8)),
        );
        let err = p.borrow().unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));
    }

    #[test]
    fn wait_limit_times_out_then_succeeds_on_return() {
        let cfg = PoolConfig::default()
            .with_max_active(Some(1))
            .with_limit_policy(LimitPolicy::Wait)
            .with_max_wait(Some(Duration::from_millis(100)));
        let p = pool(cfg);
        let held = p.borrow().unwrap();

        let start = Instant::now();
        let err = p.borrow().unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));
        assert!(start.elapsed() >= Duration::from_millis(90));

        let p2 = p.clone();
        let handle = std::thread::spawn(move || p2.borrow());
        std::thread::sleep(Duration::from_millis(20));
        held.return_resource();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn idle_count_cap_destroys_least_desirable() {
        let p = pool(
            PoolConfig::default().with_borrow_policy(BorrowPolicy::Fifo).with_max_idle(Some(2)),
        );
        let r0 = p.borrow().unwrap();
        let r1 = p.borrow().unwrap();
        let r2 = p.borrow().unwrap();
        let v0 = *r0;
        r0.return_resource();
        r1.return_resource();
        r2.return_resource();
        assert_eq!(p.num_idle(), 2);
        let _ = v0;
    }

    #[test]
    fn reference_tracker_detects_leak() {
        let p = pool(PoolConfig::default().with_tracking_policy(TrackingPolicy::Reference));
        let guard = p.borrow().unwrap();
        let _leaked = guard.detach();
        assert_eq!(p.num_active(), 1);
        p.core.state.lock().tracker.sweep();
        assert_eq!(p.num_active(), 0);
    }

    #[test]
    fn validate_on_return_invalidates() {
        struct Flaky;
        impl ResourceFactory<()> for Flaky {
            type Error = Infallible;
            fn create(&self) -> Result<(), Self::Error> {
                Ok(())
            }
            fn destroy(&self, _resource: &mut ()) {}
            fn validate(&self, _resource: &()) -> bool {
                false
            }
        }
        let p = CompositePool::new(
            "flaky",
            PoolConfig::default().with_validate_on_return(true),
            Flaky,
        )
        .unwrap();
        let guard = p.borrow().unwrap();
        guard.return_resource();
        assert_eq!(p.num_idle(), 0);
    }

    #[test]
    fn invalidate_removes_from_tracking() {
        let p = pool(PoolConfig::default());
        let guard = p.borrow().unwrap();
        assert_eq!(p.num_active(), 1);
        guard.invalidate();
        assert_eq!(p.num_active(), 0);
        assert_eq!(p.num_idle(), 0);
    }

    #[test]
    fn close_is_idempotent_and_drains_idle() {
        let p = pool(PoolConfig::default());
        let guard = p.borrow().unwrap();
        guard.return_resource();
        assert_eq!(p.num_idle(), 1);
        p.close();
        p.close();
        assert_eq!(p.num_idle(), 0);
        assert!(matches!(p.borrow().unwrap_err(), PoolError::PoolClosed { .. }));
    }

    #[test]
    fn outstanding_guard_destroys_silently_after_close() {
        let p = pool(PoolConfig::default());
        let guard = p.borrow().unwrap();
        p.close();
        guard.return_resource();
        assert_eq!(p.num_idle(), 0);
    }

    #[test]
    fn add_creates_and_idles_a_resource() {
        let p = pool(PoolConfig::default());
        assert_eq!(p.num_idle(), 0);
        p.add().unwrap();
        assert_eq!(p.num_idle(), 1);
    }

    #[test]
    fn clear_drains_without_closing() {
        let p = pool(PoolConfig::default());
        p.add().unwrap();
        p.add().unwrap();
        p.clear();
        assert_eq!(p.num_idle(), 0);
        assert!(p.borrow().is_ok());
    }
}
