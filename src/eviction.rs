//! The shared eviction timer: one process-wide background thread that
//! every pool registers its periodic sweeps with.
//!
//! There is no deferred-destroy timer here: `destroy` runs synchronously
//! on the caller's thread or a background thread after the pool mutex is
//! released (see `crate::pool`). This scheduler exists for exactly what
//! still needs periodic wakeups: idle-timeout eviction and periodic
//! invalid-idle re-validation.
//!
//! Each registered task is a `Weak<dyn Fn() + Send + Sync>`; the strong
//! `Arc` is held by the pool that registered it (in its
//! `_eviction_tokens` field). When a pool is dropped, its tokens drop,
//! the `Weak` fails to upgrade on the next tick, and the scheduler prunes
//! the entry — no explicit unregister call is needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Tick interval for the background sweep thread. Idle/invalid timers
/// configured with a shorter duration than this still fire, just
/// quantized to the next tick, which is acceptable jitter for the
/// millisecond-scale idle/invalidation windows pools typically configure.
const TICK: Duration = Duration::from_millis(20);

struct ScheduledTask {
    interval: Duration,
    next_due: Instant,
    run: Weak<dyn Fn() + Send + Sync>,
}

/// A background timer shared by every pool that configures idle-timeout
/// or periodic invalid-idle eviction.
pub struct EvictionScheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
    started: AtomicBool,
}

impl EvictionScheduler {
    fn new() -> Arc<Self> {
        Arc::new(Self { tasks: Mutex::new(Vec::new()), started: AtomicBool::new(false) })
    }

    /// The process-wide shared instance.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<EvictionScheduler>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(EvictionScheduler::new))
    }

    /// Register a periodic task. `run` must be cheap to call spuriously;
    /// this scheduler doesn't guard against re-entrancy beyond what the
    /// task's own locking (on the pool mutex) provides.
    pub fn register(self: &Arc<Self>, interval: Duration, run: Weak<dyn Fn() + Send + Sync>) {
        self.tasks.lock().push(ScheduledTask { interval, next_due: Instant::now() + interval, run });
        self.ensure_started();
    }

    fn ensure_started(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let scheduler = Arc::clone(self);
        std::thread::Builder::new()
            .name("composite-pool-eviction".into())
            .spawn(move || loop {
                std::thread::sleep(TICK);
                scheduler.tick();
            })
            .expect("failed to spawn eviction scheduler thread");
    }

    fn tick(&self) {
        let now = Instant::now();
        let mut due = Vec::new();
        {
            let mut tasks = self.tasks.lock();
            tasks.retain_mut(|task| {
                let Some(run) = task.run.upgrade() else {
                    return false;
                };
                if now >= task.next_due {
                    due.push(run);
                    task.next_due = now + task.interval;
                }
                true
            });
        }
        // Run callbacks outside the scheduler's own lock: each callback
        // takes a pool mutex internally, and holding an unrelated lock
        // across that call would only widen blast radius on a panic.
        for run in due {
            run();
        }
    }

    #[cfg(test)]
    pub(crate) fn isolated() -> Arc<Self> {
        EvictionScheduler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn fires_registered_task_periodically() {
        let scheduler = EvictionScheduler::isolated();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let token: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        scheduler.register(Duration::from_millis(5), Arc::downgrade(&token));
        std::thread::sleep(Duration::from_millis(80));
        assert!(count.load(Ordering::Relaxed) >= 2, "expected multiple firings");
        drop(token);
    }

    #[test]
    fn prunes_task_once_owner_is_dropped() {
        let scheduler = EvictionScheduler::isolated();
        let token: Arc<dyn Fn() + Send + Sync> = Arc::new(|| {});
        scheduler.register(Duration::from_millis(5), Arc::downgrade(&token));
        drop(token);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(scheduler.tasks.lock().len(), 0);
    }
}
