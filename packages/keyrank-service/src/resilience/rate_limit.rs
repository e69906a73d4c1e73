use std::{
	num::NonZeroU32,
	sync::atomic::{AtomicU32, Ordering},
	time::Duration,
};

use governor::{
	Quota, RateLimiter,
	clock::Clock,
	middleware::StateInformationMiddleware,
	nanos::Nanos,
	state::{InMemoryState, NotKeyed},
};
use serde::Serialize;
use tokio::time::Instant;

use crate::{Error, FetchError, Result};
use keyrank_config::RateLimit;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, TokioClock, StateInformationMiddleware>;

/// Governor clock reading tokio time, so refills follow the same clock as the waits in
/// `acquire`, paused test time included.
#[derive(Debug, Clone, Copy)]
struct TokioClock {
	origin: Instant,
}
impl Clock for TokioClock {
	type Instant = Nanos;

	fn now(&self) -> Nanos {
		Nanos::from(Instant::now().saturating_duration_since(self.origin))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateLimiterSnapshot {
	pub capacity: u32,
	pub refill_per_second: f64,
	/// Burst capacity left after the most recent acquire. Refills are not reflected until the
	/// next acquire.
	pub tokens_available: u32,
}

/// Process-wide token bucket in front of every external call.
pub struct TokenBucket {
	limiter: DirectLimiter,
	clock: TokioClock,
	capacity: u32,
	refill_per_second: f64,
	acquire_timeout: Duration,
	tokens_available: AtomicU32,
}
impl TokenBucket {
	pub fn new(cfg: &RateLimit) -> Result<Self> {
		let capacity = NonZeroU32::new(cfg.capacity).ok_or_else(|| Error::InvalidConfig {
			message: "fetch.rate_limit.capacity must be greater than zero.".to_string(),
		})?;
		let period = Duration::try_from_secs_f64(1.0 / cfg.refill_per_second).map_err(|_| {
			Error::InvalidConfig {
				message: "fetch.rate_limit.refill_per_second must be positive and finite."
					.to_string(),
			}
		})?;
		let quota = Quota::with_period(period)
			.ok_or_else(|| Error::InvalidConfig {
				message: "fetch.rate_limit.refill_per_second is too large.".to_string(),
			})?
			.allow_burst(capacity);
		let clock = TokioClock { origin: Instant::now() };
		let limiter = RateLimiter::direct_with_clock(quota, &clock)
			.with_middleware::<StateInformationMiddleware>();

		Ok(Self {
			limiter,
			clock,
			capacity: cfg.capacity,
			refill_per_second: cfg.refill_per_second,
			acquire_timeout: Duration::from_millis(cfg.acquire_timeout_ms),
			tokens_available: AtomicU32::new(cfg.capacity),
		})
	}

	/// Takes one token, waiting cooperatively while the wait still fits the acquire timeout.
	pub async fn acquire(&self) -> Result<(), FetchError> {
		let started = Instant::now();
		let deadline = started + self.acquire_timeout;

		loop {
			match self.limiter.check() {
				Ok(state) => {
					self.tokens_available.store(state.remaining_burst_capacity(), Ordering::Relaxed);

					return Ok(());
				},
				Err(not_until) => {
					self.tokens_available.store(0, Ordering::Relaxed);

					let wait = not_until.wait_time_from(self.clock.now());
					let now = Instant::now();

					if now + wait > deadline {
						let waited_ms = crate::millis(now - started);

						tracing::warn!(waited_ms, "Rate limiter acquire timed out.");

						return Err(FetchError::RateLimitExceeded { waited_ms });
					}

					tokio::time::sleep(wait).await;
				},
			}
		}
	}

	pub fn snapshot(&self) -> RateLimiterSnapshot {
		RateLimiterSnapshot {
			capacity: self.capacity,
			refill_per_second: self.refill_per_second,
			tokens_available: self.tokens_available.load(Ordering::Relaxed),
		}
	}
}
