//! Error types for the composite object pool engine
//!
//! Follows the convention of a single `thiserror`-derived enum with one
//! variant per observable error kind, plus convenience constructors that
//! also emit a `tracing` event when the `logging` feature is on.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::warn;

/// Result alias used throughout the crate.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by pool operations.
///
/// Failures during the idle drain (`activate`/`validate`) and during
/// `return` (`passivate`/`validate`) are absorbed internally and never
/// reach this type; `destroy` failures are always absorbed. Only the
/// kinds below are ever handed back to a caller.
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PoolError {
    /// Operation attempted on a pool that has been closed.
    #[error("pool '{pool}' is closed")]
    PoolClosed {
        /// Name or key identifying the pool (unkeyed pools use `"default"`).
        pool: String,
    },

    /// `borrow` could not deliver a resource.
    ///
    /// Carries the last factory error seen while draining the idle
    /// buffer, when one occurred, so callers can diagnose why every
    /// idle candidate was rejected.
    #[error("pool '{pool}' exhausted")]
    Exhausted {
        /// Name or key identifying the pool.
        pool: String,
        /// Last activation/validation failure observed during drain, if any.
        #[source]
        cause: Option<Box<PoolError>>,
    },

    /// An invariant of the pool's internal bookkeeping was violated.
    ///
    /// Always indicates caller misuse (returning a resource never
    /// borrowed from this pool, returning more than were borrowed, or
    /// invalidating a resource still present in the idle buffer) rather
    /// than an internal bug, though the pool cannot always tell which.
    #[error("pool invariant violated: {reason}")]
    InvariantViolation {
        /// Human-readable description of which invariant was broken.
        reason: String,
    },

    /// A `borrow` that was waiting on `WaitOnLimit` was cancelled.
    #[error("borrow cancelled after waiting on pool '{pool}'")]
    Cancelled {
        /// Name or key identifying the pool.
        pool: String,
    },

    /// The resource factory's `create` call failed.
    #[error("resource factory failed to create a new instance")]
    Factory {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The pool configuration was rejected by the builder.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },
}

impl PoolError {
    /// Whether retrying the operation that produced this error might
    /// succeed without any corrective action (e.g. after a return frees
    /// capacity for a `WaitOnLimit` manager).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::Cancelled { .. })
    }

    /// Stable, greppable error code for categorization in logs/metrics.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PoolClosed { .. } => "POOL:CLOSED",
            Self::Exhausted { .. } => "POOL:EXHAUSTED",
            Self::InvariantViolation { .. } => "POOL:INVARIANT",
            Self::Cancelled { .. } => "POOL:CANCELLED",
            Self::Factory { .. } => "POOL:FACTORY",
            Self::InvalidConfig { .. } => "POOL:INVALID_CONFIG",
        }
    }

    pub(crate) fn closed(pool: impl Into<String>) -> Self {
        Self::PoolClosed { pool: pool.into() }
    }

    pub(crate) fn exhausted(pool: impl Into<String>, cause: Option<PoolError>) -> Self {
        let pool = pool.into();
        #[cfg(feature = "logging")]
        warn!(pool = %pool, "pool exhausted");
        Self::Exhausted { pool, cause: cause.map(Box::new) }
    }

    pub(crate) fn exhausted_after_timeout(pool: impl Into<String>, waited: Duration) -> Self {
        let pool = pool.into();
        #[cfg(feature = "logging")]
        warn!(pool = %pool, waited_ms = waited.as_millis() as u64, "borrow timed out waiting for capacity");
        Self::Exhausted { pool, cause: None }
    }

    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation { reason: reason.into() }
    }

    pub(crate) fn cancelled(pool: impl Into<String>) -> Self {
        Self::Cancelled { pool: pool.into() }
    }

    pub(crate) fn factory(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Factory { source: Box::new(source) }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig { reason: reason.into() }
    }
}

/// A boxed, type-erased error from factory callbacks (`destroy`,
/// `passivate`) whose failures are always absorbed — kept as a distinct
/// alias so call sites documenting "this is swallowed" read clearly.
pub type AbsorbedError = Box<dyn fmt::Debug + Send + Sync + 'static>;
