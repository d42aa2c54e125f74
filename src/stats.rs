//! Pool statistics.
//!
//! Plain atomics rather than a mutex-guarded struct, since every counter
//! here is independent and none needs to be read-modify-written alongside
//! another under the pool mutex. Exposed through [`crate::pool::CompositePool::stats`]
//! behind the `stats` feature, which is on by default.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of a pool's lifetime counters.
///
/// Unlike `num_active`/`num_idle`, nothing here participates in the
/// pool's own locking discipline — these are independent atomics updated
/// alongside (never instead of) the authoritative Lender/Tracker state,
/// so a snapshot is a point-in-time approximation under concurrent load.
#[derive(Debug, Default)]
pub struct PoolStats {
    borrows: AtomicU64,
    returns: AtomicU64,
    invalidations: AtomicU64,
    creates: AtomicU64,
    destroys: AtomicU64,
    idle_hits: AtomicU64,
    idle_misses: AtomicU64,
    exhausted: AtomicU64,
    peak_idle: AtomicUsize,
    peak_active: AtomicUsize,
}

/// Read-only, cheaply cloned view of a [`PoolStats`] at one instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStatsSnapshot {
    pub borrows: u64,
    pub returns: u64,
    pub invalidations: u64,
    pub creates: u64,
    pub destroys: u64,
    pub idle_hits: u64,
    pub idle_misses: u64,
    pub exhausted: u64,
    pub peak_idle: usize,
    pub peak_active: usize,
}

impl PoolStats {
    pub(crate) fn record_borrow(&self) {
        self.borrows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_hit(&self) {
        self.idle_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_miss(&self) {
        self.idle_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_create(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_destroy(&self) {
        self.destroys.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn observe_idle(&self, idle: usize) {
        self.peak_idle.fetch_max(idle, Ordering::Relaxed);
    }

    pub(crate) fn observe_active(&self, active: i64) {
        if active >= 0 {
            self.peak_active.fetch_max(active as usize, Ordering::Relaxed);
        }
    }

    /// A point-in-time copy of every counter.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            borrows: self.borrows.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            creates: self.creates.load(Ordering::Relaxed),
            destroys: self.destroys.load(Ordering::Relaxed),
            idle_hits: self.idle_hits.load(Ordering::Relaxed),
            idle_misses: self.idle_misses.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            peak_idle: self.peak_idle.load(Ordering::Relaxed),
            peak_active: self.peak_active.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = PoolStats::default();
        let snap = stats.snapshot();
        assert_eq!(snap.borrows, 0);
        assert_eq!(snap.peak_idle, 0);
    }

    #[test]
    fn peak_idle_tracks_the_high_water_mark() {
        let stats = PoolStats::default();
        stats.observe_idle(3);
        stats.observe_idle(1);
        stats.observe_idle(5);
        assert_eq!(stats.snapshot().peak_idle, 5);
    }
}
