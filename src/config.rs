//! Pool configuration record and the `PoolConfig` builder.
//!
//! A plain data record with `with_*` chained setters, validated once by
//! [`crate::builder`] rather than scattered through the orchestrator.

use std::time::Duration;

/// Idle-buffer order and backing discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowPolicy {
    /// Insert at tail, borrow from head.
    Fifo,
    /// Insert at tail, borrow from tail.
    Lifo,
    /// FIFO ordering, idle entries held as a bounded soft-reference-like cache.
    SoftFifo,
    /// LIFO ordering, idle entries held as a bounded soft-reference-like cache.
    SoftLifo,
    /// No idle storage at all; every borrow is a miss.
    Null,
}

/// What to do when the idle buffer is empty at `borrow` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Create a new instance via the factory.
    Grow,
    /// Raise [`crate::error::PoolError::Exhausted`] immediately.
    Fail,
}

/// Behavior when `max_active` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPolicy {
    /// Raise `Exhausted` immediately.
    Fail,
    /// Block the calling thread until capacity frees up or the wait times out.
    Wait,
}

/// Active-resource bookkeeping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPolicy {
    /// Integer counter only.
    Simple,
    /// No tracking; `num_active` reports a sentinel.
    Null,
    /// Identity-keyed map with leak detection on drop-without-return.
    Reference,
    /// As `Reference`, plus call-site capture and a warning on leak.
    Debug,
}

/// Full configuration record recognized by [`crate::builder::validate`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub borrow_policy: BorrowPolicy,
    pub exhaustion_policy: ExhaustionPolicy,
    /// `None` means unlimited idle retention; `Some(0)` means no idle
    /// retention at all; `Some(n)` for `n > 0` is a hard cap. Represented
    /// as `Option<usize>` rather than a signed sentinel.
    pub max_idle: Option<usize>,
    /// `None` means unlimited concurrently-active resources.
    pub max_active: Option<usize>,
    pub limit_policy: LimitPolicy,
    /// Effective only under `LimitPolicy::Wait`. `None` means wait indefinitely.
    pub max_wait: Option<Duration>,
    pub tracking_policy: TrackingPolicy,
    pub validate_on_return: bool,
    /// `None` disables idle-timeout eviction.
    pub evict_idle_after: Option<Duration>,
    /// `None` disables periodic invalid-idle re-validation.
    pub evict_invalid_every: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            borrow_policy: BorrowPolicy::Lifo,
            exhaustion_policy: ExhaustionPolicy::Grow,
            max_idle: Some(8),
            max_active: None,
            limit_policy: LimitPolicy::Fail,
            max_wait: None,
            tracking_policy: TrackingPolicy::Simple,
            validate_on_return: false,
            evict_idle_after: None,
            evict_invalid_every: None,
        }
    }
}

impl PoolConfig {
    /// A pool that grows on demand and never bounds idle or active counts.
    pub fn unbounded() -> Self {
        Self { max_idle: None, max_active: None, ..Default::default() }
    }

    /// A pool with a hard active-resource cap that blocks borrowers
    /// until capacity is available.
    pub fn bounded(max_active: usize) -> Self {
        Self {
            max_active: Some(max_active),
            limit_policy: LimitPolicy::Wait,
            ..Default::default()
        }
    }

    pub fn with_borrow_policy(mut self, policy: BorrowPolicy) -> Self {
        self.borrow_policy = policy;
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion_policy = policy;
        self
    }

    pub fn with_max_idle(mut self, max_idle: Option<usize>) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_max_active(mut self, max_active: Option<usize>) -> Self {
        self.max_active = max_active;
        self
    }

    pub fn with_limit_policy(mut self, policy: LimitPolicy) -> Self {
        self.limit_policy = policy;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_tracking_policy(mut self, policy: TrackingPolicy) -> Self {
        self.tracking_policy = policy;
        self
    }

    pub fn with_validate_on_return(mut self, validate: bool) -> Self {
        self.validate_on_return = validate;
        self
    }

    pub fn with_evict_idle_after(mut self, duration: Option<Duration>) -> Self {
        self.evict_idle_after = duration;
        self
    }

    pub fn with_evict_invalid_every(mut self, duration: Option<Duration>) -> Self {
        self.evict_invalid_every = duration;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lifo_grow_bounded_idle() {
        let config = PoolConfig::default();
        assert_eq!(config.borrow_policy, BorrowPolicy::Lifo);
        assert_eq!(config.exhaustion_policy, ExhaustionPolicy::Grow);
        assert_eq!(config.max_idle, Some(8));
        assert_eq!(config.max_active, None);
    }

    #[test]
    fn bounded_sets_wait_limit() {
        let config = PoolConfig::bounded(4);
        assert_eq!(config.max_active, Some(4));
        assert_eq!(config.limit_policy, LimitPolicy::Wait);
    }
}
