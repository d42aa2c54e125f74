//! The Builder: the single place strategy composition and configuration
//! validation happens. Pools never re-parent their strategies after
//! construction.

use crate::config::{BorrowPolicy, ExhaustionPolicy, PoolConfig, TrackingPolicy};
use crate::error::{PoolError, PoolResult};

/// Validates a [`PoolConfig`], rejecting combinations that can never
/// produce a usable pool.
pub(crate) fn validate(config: &PoolConfig) -> PoolResult<()> {
    if matches!(config.borrow_policy, BorrowPolicy::Null)
        && config.exhaustion_policy == ExhaustionPolicy::Fail
    {
        return Err(PoolError::invalid_config(
            "Null borrow policy combined with Fail exhaustion policy can never produce a borrow",
        ));
    }

    if config.max_idle == Some(0) && config.exhaustion_policy == ExhaustionPolicy::Fail {
        return Err(PoolError::invalid_config(
            "max_idle=0 combined with Fail exhaustion policy can never produce a borrow",
        ));
    }

    if config.tracking_policy == TrackingPolicy::Null && config.max_active.is_some() {
        return Err(PoolError::invalid_config(
            "Null tracking policy cannot enforce an active-count cap (max_active)",
        ));
    }

    Ok(())
}
