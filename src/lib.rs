//! A composable object pool.
//!
//! Each pool is assembled from five pluggable strategy roles — a Lender
//! (idle-buffer order and eviction), a Manager (admission/growth
//! policy), a Tracker (active-resource bookkeeping), a
//! [`ResourceFactory`](factory::ResourceFactory) (the application's
//! create/activate/validate/passivate/destroy callbacks), and a shared
//! [`EvictionScheduler`](eviction::EvictionScheduler) — composed once at
//! construction into a [`CompositePool`](pool::CompositePool).
//! [`CompositeKeyedPool`](keyed::CompositeKeyedPool) layers a
//! `key -> Pool` map of composite pools behind a single keyed front end.
//!
//! ```
//! use std::convert::Infallible;
//! use composite_pool::{CompositePool, PoolConfig, ResourceFactory};
//!
//! struct Counter;
//! impl ResourceFactory<u64> for Counter {
//!     type Error = Infallible;
//!     fn create(&self) -> Result<u64, Self::Error> { Ok(0) }
//!     fn destroy(&self, _resource: &mut u64) {}
//! }
//!
//! let pool = CompositePool::new("counters", PoolConfig::default(), Counter).unwrap();
//! let value = pool.borrow().unwrap();
//! assert_eq!(*value, 0);
//! ```

mod builder;
pub mod config;
pub mod error;
pub mod eviction;
pub mod factory;
pub mod guard;
#[cfg(feature = "stats")]
pub mod health;
pub mod keyed;
mod lender;
mod manager;
pub mod pool;
#[cfg(feature = "stats")]
pub mod stats;
mod tracker;

pub use config::{BorrowPolicy, ExhaustionPolicy, LimitPolicy, PoolConfig, TrackingPolicy};
pub use error::{PoolError, PoolResult};
pub use eviction::EvictionScheduler;
pub use factory::{FnFactory, KeyedResourceFactory, ResourceFactory};
pub use guard::PoolGuard;
pub use keyed::CompositeKeyedPool;
pub use pool::CompositePool;
pub use tracker::UNKNOWN_ACTIVE_COUNT;

#[cfg(feature = "stats")]
pub use health::{PoolHealth, PoolHealthSnapshot};
#[cfg(feature = "stats")]
pub use stats::{PoolStats, PoolStatsSnapshot};
