//! The Tracker strategy role: active-resource bookkeeping.
//!
//! Borrowed resources are handed out as [`crate::guard::PoolGuard`]s, not
//! raw values, so the tracker never needs a GC to notice a dropped
//! reference — it needs only a [`Weak`] it can fail to upgrade. Each
//! `Reference`/`Debug` registration stores a `Weak<ActiveMarker>`; the
//! guard holds the paired `Arc<ActiveMarker>`. A normal return/invalidate
//! removes the map entry explicitly as part of teardown. The guard's
//! `detach()` escape hatch drops the marker without touching the map
//! entry, so the entry's `Weak` dangles while the entry itself is still
//! present — `sweep` treats that combination as a leak.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::warn;

use crate::error::{PoolError, PoolResult};

/// Sentinel returned by [`Tracker::borrowed`] for the `Null` variant.
pub const UNKNOWN_ACTIVE_COUNT: i64 = -1;

/// Identity token an active registration is keyed by. Opaque to callers;
/// never derived from the resource's own `Eq`/`Hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ActiveId(u64);

/// Zero-sized identity anchor. Its only job is to exist: the strong
/// count (held by the guard) vs. the registration's `Weak` is the whole
/// leak-detection mechanism.
pub(crate) struct ActiveMarker;

/// What a successful `Tracker::register` hands back to the caller
/// (`CompositePool::borrow`), to be threaded into the returned guard.
///
/// `Simple`/`Null` trackers need nothing beyond "one was registered", so
/// `id`/`marker` are `None` for them; the guard still carries a
/// `TrackerHandle` uniformly so `CompositePool` doesn't need to match on
/// tracker kind.
pub(crate) struct TrackerHandle {
    pub(crate) id: Option<ActiveId>,
    pub(crate) marker: Option<Arc<ActiveMarker>>,
}

impl TrackerHandle {
    fn counting_only() -> Self {
        Self { id: None, marker: None }
    }
}

struct ReferenceEntry {
    marker: Weak<ActiveMarker>,
    #[cfg(feature = "backtrace")]
    backtrace: Option<backtrace::Backtrace>,
}

/// Active-resource bookkeeping. A single enum rather than a trait
/// object: the variant is fixed at build time and never swapped.
pub(crate) enum Tracker {
    /// Integer counter; returning more than borrowed is a usage error.
    Simple { active: u64 },
    /// No bookkeeping at all; incompatible with any active-count cap
    /// (the builder rejects that combination before a pool exists).
    Null,
    /// Identity-keyed weak-reference map with leak detection.
    Reference { entries: HashMap<ActiveId, ReferenceEntry>, next_id: u64, lost: u64 },
    /// As `Reference`, plus call-site capture and a log on leak.
    Debug { entries: HashMap<ActiveId, ReferenceEntry>, next_id: u64, lost: u64 },
}

impl Tracker {
    pub(crate) fn simple() -> Self {
        Self::Simple { active: 0 }
    }

    pub(crate) fn null() -> Self {
        Self::Null
    }

    pub(crate) fn reference() -> Self {
        Self::Reference { entries: HashMap::new(), next_id: 0, lost: 0 }
    }

    pub(crate) fn debug() -> Self {
        Self::Debug { entries: HashMap::new(), next_id: 0, lost: 0 }
    }

    pub(crate) fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Register a newly-activated borrow. Called while holding the pool
    /// mutex.
    pub(crate) fn register(&mut self) -> TrackerHandle {
        match self {
            Self::Simple { active } => {
                *active += 1;
                TrackerHandle::counting_only()
            }
            Self::Null => TrackerHandle::counting_only(),
            Self::Reference { entries, next_id, .. } => {
                let id = ActiveId(*next_id);
                *next_id += 1;
                let marker = Arc::new(ActiveMarker);
                entries.insert(
                    id,
                    ReferenceEntry {
                        marker: Arc::downgrade(&marker),
                        #[cfg(feature = "backtrace")]
                        backtrace: None,
                    },
                );
                TrackerHandle { id: Some(id), marker: Some(marker) }
            }
            Self::Debug { entries, next_id, .. } => {
                let id = ActiveId(*next_id);
                *next_id += 1;
                let marker = Arc::new(ActiveMarker);
                #[cfg(feature = "backtrace")]
                let backtrace = Some(backtrace::Backtrace::new_unresolved());
                entries.insert(
                    id,
                    ReferenceEntry {
                        marker: Arc::downgrade(&marker),
                        #[cfg(feature = "backtrace")]
                        backtrace,
                    },
                );
                TrackerHandle { id: Some(id), marker: Some(marker) }
            }
        }
    }

    /// Remove a registration on a legitimate return/invalidate. Must be
    /// called exactly once per successful `register`; a second call (or
    /// one on a handle this tracker never issued) is caller misuse.
    pub(crate) fn unregister(&mut self, handle: &TrackerHandle) -> PoolResult<()> {
        match self {
            Self::Simple { active } => {
                if *active == 0 {
                    return Err(PoolError::invariant(
                        "returned more resources than were borrowed",
                    ));
                }
                *active -= 1;
                Ok(())
            }
            Self::Null => Ok(()),
            Self::Reference { entries, .. } | Self::Debug { entries, .. } => {
                let Some(id) = handle.id else {
                    return Err(PoolError::invariant(
                        "return handle carries no tracker identity",
                    ));
                };
                if entries.remove(&id).is_none() {
                    return Err(PoolError::invariant(
                        "resource not registered as active with this pool",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Number of resources currently borrowed, or [`UNKNOWN_ACTIVE_COUNT`]
    /// for `Null`.
    pub(crate) fn borrowed(&self) -> i64 {
        match self {
            Self::Simple { active } => *active as i64,
            Self::Null => UNKNOWN_ACTIVE_COUNT,
            Self::Reference { entries, .. } | Self::Debug { entries, .. } => {
                entries.len() as i64
            }
        }
    }

    /// Number of leaked (dropped-without-return) entries detected so far.
    /// Always `0` for `Simple`/`Null`, which cannot detect leaks.
    pub(crate) fn lost_count(&self) -> u64 {
        match self {
            Self::Simple { .. } | Self::Null => 0,
            Self::Reference { lost, .. } | Self::Debug { lost, .. } => *lost,
        }
    }

    /// Sweep for entries whose marker has been dropped without the
    /// corresponding `unregister`. No-op for `Simple`/`Null`.
    pub(crate) fn sweep(&mut self) {
        let is_debug = matches!(self, Self::Debug { .. });
        let (entries, lost) = match self {
            Self::Reference { entries, lost, .. } | Self::Debug { entries, lost, .. } => {
                (entries, lost)
            }
            Self::Simple { .. } | Self::Null => return,
        };
        let leaked: Vec<ActiveId> = entries
            .iter()
            .filter(|(_, entry)| entry.marker.upgrade().is_none())
            .map(|(id, _)| *id)
            .collect();
        for id in leaked {
            entries.remove(&id);
            *lost += 1;
            if is_debug {
                #[cfg(feature = "logging")]
                warn!(tracker = "debug", "detected leaked pool resource (dropped without return)");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_counts_and_rejects_overreturn() {
        let mut t = Tracker::simple();
        let h = t.register();
        assert_eq!(t.borrowed(), 1);
        t.unregister(&h).unwrap();
        assert_eq!(t.borrowed(), 0);
        assert!(t.unregister(&h).is_err());
    }

    #[test]
    fn null_reports_sentinel() {
        let t = Tracker::null();
        assert_eq!(t.borrowed(), UNKNOWN_ACTIVE_COUNT);
    }

    #[test]
    fn reference_unregister_removes_entry() {
        let mut t = Tracker::reference();
        let h = t.register();
        assert_eq!(t.borrowed(), 1);
        t.unregister(&h).unwrap();
        assert_eq!(t.borrowed(), 0);
    }

    #[test]
    fn reference_detects_leak_on_sweep() {
        let mut t = Tracker::reference();
        let h = t.register();
        assert_eq!(t.borrowed(), 1);
        drop(h.marker); // simulates guard::detach() dropping the marker
        assert_eq!(t.borrowed(), 1); // entry still present until swept
        t.sweep();
        assert_eq!(t.borrowed(), 0);
        assert_eq!(t.lost_count(), 1);
    }

    #[test]
    fn reference_does_not_flag_legitimate_active_borrow() {
        let mut t = Tracker::reference();
        let h = t.register();
        t.sweep();
        assert_eq!(t.borrowed(), 1);
        assert_eq!(t.lost_count(), 0);
        t.unregister(&h).unwrap();
    }
}
