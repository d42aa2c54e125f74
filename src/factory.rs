//! The resource factory contract.
//!
//! The factory is the library consumer's collaborator: the composite
//! engine never constructs, inspects, or destroys a resource except
//! through these callbacks.

use std::error::Error as StdError;

/// Creates, validates, and destroys the pooled resource type `R`.
///
/// All methods must be callable from arbitrary threads (the engine may
/// invoke them from the borrowing thread, from an eviction-timer thread,
/// or from a deferred-destroy worker).
pub trait ResourceFactory<R>: Send + Sync {
    /// The error type `create` can fail with. Propagates to the caller
    /// of `borrow`/`add`, wrapped in [`crate::error::PoolError::Factory`].
    type Error: StdError + Send + Sync + 'static;

    /// The only source of new instances.
    fn create(&self) -> Result<R, Self::Error>;

    /// Idempotent. Errors are absorbed by the pool (never propagated).
    fn destroy(&self, resource: &mut R);

    /// Must not mutate `resource`.
    fn validate(&self, _resource: &R) -> bool {
        true
    }

    /// Moves `resource` from idle to active representation. Failure
    /// causes the caller to invalidate `resource`.
    fn activate(&self, _resource: &mut R) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Moves `resource` from active back to idle representation.
    /// Failure causes the caller to invalidate `resource`.
    fn passivate(&self, _resource: &mut R) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A [`ResourceFactory`] parameterized over an explicit key, used by
/// [`crate::keyed::CompositeKeyedPool`] to produce per-key resources.
///
/// Each per-key pool wraps its one key and this factory behind a private
/// adapter that implements plain [`ResourceFactory`], so the per-key
/// engine stays key-unaware.
pub trait KeyedResourceFactory<K, R>: Send + Sync {
    type Error: StdError + Send + Sync + 'static;

    fn create(&self, key: &K) -> Result<R, Self::Error>;
    fn destroy(&self, key: &K, resource: &mut R);

    fn validate(&self, _key: &K, resource: &R) -> bool {
        let _ = resource;
        true
    }
    fn activate(&self, _key: &K, _resource: &mut R) -> Result<(), Self::Error> {
        Ok(())
    }
    fn passivate(&self, _key: &K, _resource: &mut R) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A closure-backed [`ResourceFactory`] for the common case where only
/// `create` needs custom behavior; `destroy` is a no-op.
pub struct FnFactory<F, R, E> {
    create: F,
    _marker: std::marker::PhantomData<fn() -> Result<R, E>>,
}

impl<F, R, E> FnFactory<F, R, E>
where
    F: Fn() -> Result<R, E> + Send + Sync,
    E: StdError + Send + Sync + 'static,
{
    pub fn new(create: F) -> Self {
        Self { create, _marker: std::marker::PhantomData }
    }
}

impl<F, R, E> ResourceFactory<R> for FnFactory<F, R, E>
where
    F: Fn() -> Result<R, E> + Send + Sync,
    E: StdError + Send + Sync + 'static,
    R: Send,
{
    type Error = E;

    fn create(&self) -> Result<R, Self::Error> {
        (self.create)()
    }

    fn destroy(&self, _resource: &mut R) {}
}
