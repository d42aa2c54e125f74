//! [`PoolGuard`]: the RAII handle returned by `borrow`.
//!
//! Wraps the resource in a `ManuallyDrop<T>` and calls back into the
//! owning pool on `Drop`. The pool is referenced only through a `Weak`,
//! so it can be dropped or closed while guards are still outstanding —
//! the last guard to drop simply destroys its resource locally instead
//! of returning it to a pool that no longer exists.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use crate::tracker::TrackerHandle;

/// What a [`PoolGuard`] calls back into on teardown. Implemented by
/// `CompositePool`, including each per-key pool inside
/// `CompositeKeyedPool`; kept as a trait so this module doesn't need to
/// know about the orchestrator's internals.
pub(crate) trait GuardOwner<T>: Send + Sync {
    /// The guard was dropped normally (or `return_resource` was called
    /// explicitly): passivate/validate and return it to idle, or destroy
    /// it if either check fails.
    fn complete_return(&self, resource: T, handle: TrackerHandle);

    /// The guard was consumed via `invalidate()`: skip passivate/validate
    /// and destroy unconditionally.
    fn complete_invalidate(&self, resource: T, handle: TrackerHandle);
}

/// RAII wrapper around a borrowed pool resource.
///
/// Dereferences to `T`. Dropping it returns the resource to the pool it
/// came from (passivate → validate → idle, or destroy on failure) unless
/// the pool has since been dropped, in which case the resource is
/// destroyed locally since there is nowhere left to return it.
#[must_use = "dropping this returns the resource to the pool; call `detach()` to take it out permanently"]
pub struct PoolGuard<T> {
    value: ManuallyDrop<T>,
    handle: TrackerHandle,
    owner: Weak<dyn GuardOwner<T>>,
}

impl<T> PoolGuard<T> {
    pub(crate) fn new(value: T, handle: TrackerHandle, owner: Weak<dyn GuardOwner<T>>) -> Self {
        Self { value: ManuallyDrop::new(value), handle, owner }
    }

    /// Explicitly return the resource now rather than waiting for drop.
    /// Equivalent to letting the guard go out of scope; provided for
    /// callers that want the return to happen at a specific point.
    pub fn return_resource(self) {
        drop(self);
    }

    /// Consume the guard and destroy the resource unconditionally,
    /// bypassing passivate/validate.
    pub fn invalidate(mut self) {
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        let handle = self.take_handle();
        if let Some(owner) = self.owner.upgrade() {
            owner.complete_invalidate(value, handle);
        }
        std::mem::forget(self);
    }

    /// Take the resource out of the pool permanently. The pool's active
    /// count is *not* decremented: as far as bookkeeping is concerned
    /// this resource is still borrowed and, for `Reference`/`Debug`
    /// trackers, the dropped marker makes it indistinguishable from a
    /// leaked resource once `sweep()` next runs — which is exactly the
    /// mechanism those trackers use to report "lost" instances. Callers
    /// that want to permanently remove a resource *without* it being
    /// flagged as lost should `invalidate()` instead (if returning it to
    /// the pool's destroy path is acceptable) since `detach` is meant for
    /// "I'm taking this out from under the pool's feet."
    pub fn detach(mut self) -> T {
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        // Drop the marker (if any) without unregistering the tracker
        // entry: this is what makes the entry look leaked to `sweep()`.
        self.handle.marker.take();
        std::mem::forget(self);
        value
    }

    fn take_handle(&mut self) -> TrackerHandle {
        std::mem::replace(&mut self.handle, TrackerHandle { id: None, marker: None })
    }
}

impl<T> Deref for PoolGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for PoolGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> AsRef<T> for PoolGuard<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T> AsMut<T> for PoolGuard<T> {
    fn as_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolGuard").field("value", &*self.value).finish()
    }
}

impl<T> Drop for PoolGuard<T> {
    fn drop(&mut self) {
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        let handle = self.take_handle();
        if let Some(owner) = self.owner.upgrade() {
            owner.complete_return(value, handle);
        }
        // Owner already gone (pool dropped): nothing left to return to,
        // `value` and `handle` are simply dropped here.
    }
}
