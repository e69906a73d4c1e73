pub mod breaker;
pub mod inflight;
pub mod rate_limit;

pub use breaker::{BreakerPermit, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use inflight::{InFlightLease, InFlightRegistry, Joined, Waiter};
pub use rate_limit::{RateLimiterSnapshot, TokenBucket};

use std::sync::Arc;

use crate::Result;
use keyrank_config::Fetch;

/// Shared resilience state for every request in the process. Tests build a fresh one.
pub struct ResilienceCoordinator {
	pub limiter: TokenBucket,
	pub breaker: CircuitBreaker,
	pub inflight: Arc<InFlightRegistry>,
}
impl ResilienceCoordinator {
	pub fn new(cfg: &Fetch) -> Result<Self> {
		Ok(Self {
			limiter: TokenBucket::new(&cfg.rate_limit)?,
			breaker: CircuitBreaker::new(&cfg.breaker),
			inflight: Arc::new(InFlightRegistry::default()),
		})
	}
}
