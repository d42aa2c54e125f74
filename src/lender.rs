//! Lender: idle-buffer discipline.
//!
//! Decides which idle instance is handed out next and how idle
//! instances are stored back, plus (by composition) idle-timeout and
//! periodic-revalidation eviction.
//!
//! Conceptually a base discipline (FIFO/LIFO/Null) wrapped by a soft
//! bound and by the two eviction sweeps. Because the composition order
//! is fixed and assembled once by the builder and never re-parented,
//! this engine represents the whole stack as one concrete `Lender<T>`
//! whose fields are the (at most one of each) layer, rather than a
//! recursive `Box<dyn Lender>` chain. Observable behavior is identical;
//! there is simply nothing to dispatch through at runtime.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::BorrowPolicy;

/// An idle resource plus the bookkeeping needed by the eviction layers.
struct IdleSlot<T> {
    resource: T,
    /// When this slot was returned to the pool; used by the idle-timeout evictor.
    inserted_at: Instant,
    /// When this slot was last run through activate/validate/passivate by
    /// the periodic invalid-evictor; `None` until the first sweep touches it.
    last_checked_at: Option<Instant>,
}

/// Base idle-buffer discipline, before any evictor wrapping.
enum BaseStore<T> {
    Fifo(VecDeque<IdleSlot<T>>),
    Lifo(VecDeque<IdleSlot<T>>),
    /// No storage: `offer` drops the resource (via the caller, who must
    /// destroy it), `poll` always reports empty.
    Null,
}

/// Idle-buffer discipline for a single composite pool.
///
/// All insertion happens at the tail, regardless of borrow policy;
/// `Fifo` borrows from the head, `Lifo` borrows from the tail. This
/// keeps "oldest resident" always at the head, which is exactly what
/// both the idle-timeout evictor and the idle-count cap need: the
/// Lender's own least-desirable slot is always the head, under either
/// ordering.
pub struct Lender<T> {
    store: BaseStore<T>,
    /// `SoftFifo`/`SoftLifo`: a bounded cache standing in for a soft
    /// reference. `Some(n)` means the buffer drops its oldest entry
    /// whenever a new one would push it over `n` live slots, simulating
    /// reclamation under pressure.
    soft_bound: Option<usize>,
    /// Idle-timeout evictor, outermost layer.
    idle_ttl: Option<Duration>,
    /// Periodic re-validation evictor, wraps the base.
    invalid_every: Option<Duration>,
    /// Count of entries dropped by soft-bound reclamation, for stats/health.
    reclaimed: u64,
}

/// Outcome of an idle-timeout sweep.
pub struct IdleEvictionReport<T> {
    pub evicted: Vec<T>,
}

impl<T> Lender<T> {
    pub fn new(policy: BorrowPolicy) -> Self {
        let store = match policy {
            BorrowPolicy::Fifo | BorrowPolicy::SoftFifo => BaseStore::Fifo(VecDeque::new()),
            BorrowPolicy::Lifo | BorrowPolicy::SoftLifo => BaseStore::Lifo(VecDeque::new()),
            BorrowPolicy::Null => BaseStore::Null,
        };
        Self {
            store,
            soft_bound: None,
            idle_ttl: None,
            invalid_every: None,
            reclaimed: 0,
        }
    }

    /// A Null base suppresses all eviction layers: they would only ever
    /// operate on an empty buffer.
    fn evictors_active(&self) -> bool {
        !matches!(self.store, BaseStore::Null)
    }

    pub fn with_soft_bound(mut self, bound: Option<usize>) -> Self {
        if self.evictors_active() {
            self.soft_bound = bound;
        }
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Option<Duration>) -> Self {
        if self.evictors_active() {
            self.idle_ttl = ttl;
        }
        self
    }

    pub fn with_invalid_every(mut self, every: Option<Duration>) -> Self {
        if self.evictors_active() {
            self.invalid_every = every;
        }
        self
    }

    /// Current idle count. Lazily purges nothing by itself — soft-bound
    /// reclamation happens eagerly on `offer`, so this is always exact;
    /// there are no lazily-dead entries left to purge at read time.
    pub fn len(&self) -> usize {
        match &self.store {
            BaseStore::Fifo(q) | BaseStore::Lifo(q) => q.len(),
            BaseStore::Null => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reclaimed_count(&self) -> u64 {
        self.reclaimed
    }

    /// Store a returned resource. Returns a resource that was evicted to
    /// make room under a soft bound, if any — the caller destroys it.
    pub fn offer(&mut self, resource: T) -> Option<T> {
        let now = Instant::now();
        let slot = IdleSlot { resource, inserted_at: now, last_checked_at: None };
        match &mut self.store {
            BaseStore::Fifo(q) | BaseStore::Lifo(q) => {
                q.push_back(slot);
                if let Some(bound) = self.soft_bound {
                    if q.len() > bound {
                        self.reclaimed += 1;
                        return q.pop_front().map(|s| s.resource);
                    }
                }
                None
            }
            BaseStore::Null => Some(slot.resource),
        }
    }

    /// Extract the next idle resource per this Lender's order.
    pub fn poll(&mut self) -> Option<T> {
        match &mut self.store {
            BaseStore::Fifo(q) => q.pop_front().map(|s| s.resource),
            BaseStore::Lifo(q) => q.pop_back().map(|s| s.resource),
            BaseStore::Null => None,
        }
    }

    /// Remove and return the slot this Lender considers least desirable
    /// — always the oldest-inserted, since insertion is always at the
    /// tail regardless of borrow order. Used by the idle-count-cap
    /// manager.
    pub fn pop_least_desirable(&mut self) -> Option<T> {
        match &mut self.store {
            BaseStore::Fifo(q) | BaseStore::Lifo(q) => q.pop_front().map(|s| s.resource),
            BaseStore::Null => None,
        }
    }

    /// Present idle resources in the Lender's own front-to-back order,
    /// without removing anything.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match &self.store {
            BaseStore::Fifo(q) | BaseStore::Lifo(q) => {
                Either::Left(q.iter().map(|s| &s.resource))
            }
            BaseStore::Null => Either::Right(std::iter::empty()),
        }
    }

    /// Remove every slot whose time-in-buffer exceeds `idle_ttl`,
    /// scanning from the oldest entry and stopping at the first
    /// survivor. No-op if idle-timeout eviction isn't configured.
    pub fn evict_idle(&mut self) -> IdleEvictionReport<T> {
        let mut evicted = Vec::new();
        let Some(ttl) = self.idle_ttl else {
            return IdleEvictionReport { evicted };
        };
        let now = Instant::now();
        if let BaseStore::Fifo(q) | BaseStore::Lifo(q) = &mut self.store {
            while let Some(front) = q.front() {
                if now.duration_since(front.inserted_at) > ttl {
                    evicted.push(q.pop_front().unwrap().resource);
                } else {
                    break;
                }
            }
        }
        IdleEvictionReport { evicted }
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }

    pub fn invalid_every(&self) -> Option<Duration> {
        self.invalid_every
    }

    /// Run the periodic re-validation sweep: for every idle slot due a
    /// recheck, call `recheck(resource) -> bool` (the caller runs
    /// activate→validate→passivate and reports whether the slot stays
    /// idle). Slots that fail are removed and handed back for
    /// destruction; slots that pass are reinserted at their original
    /// position with their recheck clock reset.
    pub fn evict_invalid(&mut self, mut recheck: impl FnMut(&mut T) -> bool) -> Vec<T> {
        let mut destroyed = Vec::new();
        let Some(every) = self.invalid_every else {
            return destroyed;
        };
        let now = Instant::now();
        let q = match &mut self.store {
            BaseStore::Fifo(q) | BaseStore::Lifo(q) => q,
            BaseStore::Null => return destroyed,
        };
        let due: Vec<usize> = q
            .iter()
            .enumerate()
            .filter(|(_, s)| s.last_checked_at.map(|t| now.duration_since(t) >= every).unwrap_or(true))
            .map(|(i, _)| i)
            .collect();
        // Walk in reverse so earlier indices remain valid after removal.
        for idx in due.into_iter().rev() {
            let mut slot = q.remove(idx).expect("index came from this deque");
            if recheck(&mut slot.resource) {
                slot.last_checked_at = Some(now);
                q.insert(idx.min(q.len()), slot);
            } else {
                destroyed.push(slot.resource);
            }
        }
        destroyed
    }
}

/// Minimal two-armed iterator union, avoiding a `Box<dyn Iterator>`
/// allocation for `Lender::iter`.
enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R, Item> Iterator for Either<L, R>
where
    L: Iterator<Item = Item>,
    R: Iterator<Item = Item>,
{
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        match self {
            Either::Left(l) => l.next(),
            Either::Right(r) => r.next(),
        }
    }
}
