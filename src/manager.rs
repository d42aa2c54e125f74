//! The Manager strategy role: the `borrow` decision tree.
//!
//! A flat, config-driven struct rather than a nested `(Fail|Wait)Limit`
//! wrapping a `(Grow|Fail)Base` chain — since the wrapping order never
//! changes after the builder runs, one struct switching on its policy
//! fields models a fixed, builder-assembled stack more directly than
//! literal wrapper types would. `CompositePool` holds the pool mutex and
//! the `Condvar` the wait path blocks on, since that condition is bound
//! to the idle buffer, which only the orchestrator owns — so this module
//! only makes the policy decisions; it never locks anything itself.

use std::time::Duration;

use crate::config::{ExhaustionPolicy, LimitPolicy, PoolConfig};

/// What `CompositePool::borrow` should do once the Lender's idle drain
/// comes up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaseDecision {
    /// Call the factory and hand back a freshly created instance.
    Grow,
    /// Raise `Exhausted` without ever calling the factory.
    Fail,
}

/// What `CompositePool::borrow` should do when the active-count cap is
/// in effect and currently full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LimitDecision {
    /// No cap configured, or there's room: proceed immediately.
    Proceed,
    /// Raise `Exhausted` immediately (`FailOnLimit`).
    FailNow,
    /// Release the pool mutex and wait on the idle-buffer condition
    /// (`WaitOnLimit`), bounded by the carried deadline if any.
    Wait { deadline: Option<Duration> },
}

/// The two exponential moving averages used to decide whether creation
/// is "expensive" relative to activation, ≈10-sample weight
/// (`avg' = (9·avg + sample) / 10`).
#[derive(Debug, Default, Clone, Copy)]
struct MovingAverages {
    creation_nanos: f64,
    activation_nanos: f64,
}

impl MovingAverages {
    fn record_creation(&mut self, sample: Duration) {
        self.creation_nanos = Self::update(self.creation_nanos, sample);
    }

    fn record_activation(&mut self, sample: Duration) {
        self.activation_nanos = Self::update(self.activation_nanos, sample);
    }

    fn update(avg: f64, sample: Duration) -> f64 {
        let sample = sample.as_nanos() as f64;
        if avg == 0.0 {
            sample
        } else {
            (9.0 * avg + sample) / 10.0
        }
    }

    /// `activation-avg > 0 and 3 * activation-avg < creation-avg`.
    fn creation_is_expensive(&self) -> bool {
        self.activation_nanos > 0.0 && 3.0 * self.activation_nanos < self.creation_nanos
    }
}

/// Admission/growth/capacity policy.
pub(crate) struct Manager {
    exhaustion_policy: ExhaustionPolicy,
    limit_policy: LimitPolicy,
    max_active: Option<usize>,
    max_wait: Option<Duration>,
    max_idle: Option<usize>,
    averages: MovingAverages,
}

impl Manager {
    pub(crate) fn new(config: &PoolConfig) -> Self {
        Self {
            exhaustion_policy: config.exhaustion_policy,
            limit_policy: config.limit_policy,
            max_active: config.max_active,
            max_wait: config.max_wait,
            max_idle: config.max_idle,
            averages: MovingAverages::default(),
        }
    }

    /// The idle drain produced nothing usable.
    pub(crate) fn on_idle_exhausted(&self) -> BaseDecision {
        match self.exhaustion_policy {
            ExhaustionPolicy::Grow => BaseDecision::Grow,
            ExhaustionPolicy::Fail => BaseDecision::Fail,
        }
    }

    /// Is the active-count cap in effect, and full? `active` is whatever
    /// `Tracker::borrowed` currently reports; the
    /// builder rejects `Null` tracker + active-count cap, so a negative
    /// sentinel is never observed here when `max_active` is `Some`.
    pub(crate) fn check_active_limit(&self, active: i64) -> LimitDecision {
        let Some(max) = self.max_active else {
            return LimitDecision::Proceed;
        };
        if active < 0 || (active as usize) < max {
            return LimitDecision::Proceed;
        }
        match self.limit_policy {
            LimitPolicy::Fail => LimitDecision::FailNow,
            LimitPolicy::Wait => LimitDecision::Wait { deadline: self.max_wait },
        }
    }

    /// After a return, is the idle buffer over its cap?
    pub(crate) fn idle_over_cap(&self, idle_count: usize) -> bool {
        self.max_idle.is_some_and(|max| idle_count >= max)
    }

    pub(crate) fn record_creation_sample(&mut self, sample: Duration) {
        self.averages.record_creation(sample);
    }

    pub(crate) fn record_activation_sample(&mut self, sample: Duration) {
        self.averages.record_activation(sample);
    }

    /// Whether `borrow` should kick off a background pre-fill after
    /// satisfying this caller from a freshly created instance. Only
    /// meaningful under `Grow`; `CompositePool` only checks this after
    /// taking the `Grow` branch.
    pub(crate) fn should_prefill(&self) -> bool {
        self.averages.creation_is_expensive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingPolicy;

    fn config() -> PoolConfig {
        PoolConfig::default()
    }

    #[test]
    fn grow_policy_grows_on_idle_exhaustion() {
        let m = Manager::new(&config());
        assert_eq!(m.on_idle_exhausted(), BaseDecision::Grow);
    }

    #[test]
    fn fail_policy_fails_on_idle_exhaustion() {
        let cfg = config().with_exhaustion_policy(ExhaustionPolicy::Fail);
        let m = Manager::new(&cfg);
        assert_eq!(m.on_idle_exhausted(), BaseDecision::Fail);
    }

    #[test]
    fn no_cap_always_proceeds() {
        let m = Manager::new(&config());
        assert_eq!(m.check_active_limit(1_000_000), LimitDecision::Proceed);
    }

    #[test]
    fn fail_on_limit_fails_when_full() {
        let cfg = config()
            .with_max_active(Some(2))
            .with_limit_policy(LimitPolicy::Fail)
            .with_tracking_policy(TrackingPolicy::Simple);
        let m = Manager::new(&cfg);
        assert_eq!(m.check_active_limit(1), LimitDecision::Proceed);
        assert_eq!(m.check_active_limit(2), LimitDecision::FailNow);
    }

    #[test]
    fn wait_on_limit_waits_when_full() {
        let cfg = PoolConfig::bounded(2);
        let m = Manager::new(&cfg);
        assert_eq!(m.check_active_limit(2), LimitDecision::Wait { deadline: None });
    }

    #[test]
    fn idle_cap_enforced() {
        let cfg = config().with_max_idle(Some(3));
        let m = Manager::new(&cfg);
        assert!(!m.idle_over_cap(2));
        assert!(m.idle_over_cap(3));
    }

    #[test]
    fn creation_expensive_only_once_averages_warm_up() {
        let mut m = Manager::new(&config());
        assert!(!m.should_prefill());
        m.record_activation_sample(Duration::from_micros(10));
        m.record_creation_sample(Duration::from_millis(10));
        assert!(m.should_prefill());
    }
}
