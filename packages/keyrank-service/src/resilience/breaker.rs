use std::{
	sync::{Mutex, MutexGuard, PoisonError},
	time::Duration,
};

use serde::Serialize;
use tokio::time::Instant;

use crate::FetchError;
use keyrank_config::Breaker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
	Closed,
	Open,
	HalfOpen,
}
impl BreakerState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Closed => "CLOSED",
			Self::Open => "OPEN",
			Self::HalfOpen => "HALF_OPEN",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
	pub state: BreakerState,
	pub consecutive_failures: u32,
	pub cooldown_ms: u64,
	/// Time left before an open breaker admits a trial call.
	pub retry_after_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
	state: BreakerState,
	consecutive_failures: u32,
	cooldown: Duration,
	open_until: Option<Instant>,
	trial_in_flight: bool,
}

/// CLOSED → OPEN → HALF_OPEN state machine guarding the search index.
#[derive(Debug)]
pub struct CircuitBreaker {
	inner: Mutex<Inner>,
	failure_threshold: u32,
	base_cooldown: Duration,
	cooldown_multiplier: f64,
	max_cooldown: Duration,
}
impl CircuitBreaker {
	pub fn new(cfg: &Breaker) -> Self {
		let base_cooldown = Duration::from_millis(cfg.cooldown_ms);

		Self {
			inner: Mutex::new(Inner {
				state: BreakerState::Closed,
				consecutive_failures: 0,
				cooldown: base_cooldown,
				open_until: None,
				trial_in_flight: false,
			}),
			failure_threshold: cfg.failure_threshold,
			base_cooldown,
			cooldown_multiplier: cfg.cooldown_multiplier,
			max_cooldown: Duration::from_millis(cfg.max_cooldown_ms.max(cfg.cooldown_ms)),
		}
	}

	/// Admits a call or rejects it immediately. An elapsed cooldown turns the breaker HALF_OPEN
	/// and hands the single trial slot to this caller.
	pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, FetchError> {
		let mut inner = self.lock();
		let now = Instant::now();

		match inner.state {
			BreakerState::Closed => Ok(BreakerPermit::new(self, false)),
			BreakerState::Open => {
				let open_until = inner.open_until.unwrap_or(now);

				if now < open_until {
					return Err(FetchError::BreakerOpen {
						retry_after_ms: crate::millis(open_until - now),
					});
				}

				inner.state = BreakerState::HalfOpen;
				inner.trial_in_flight = true;

				tracing::info!(breaker_state = "HALF_OPEN", "Circuit breaker admitting trial call.");

				Ok(BreakerPermit::new(self, true))
			},
			BreakerState::HalfOpen => {
				if inner.trial_in_flight {
					return Err(FetchError::BreakerOpen { retry_after_ms: 0 });
				}

				inner.trial_in_flight = true;

				Ok(BreakerPermit::new(self, true))
			},
		}
	}

	pub fn state(&self) -> BreakerState {
		self.lock().state
	}

	pub fn snapshot(&self) -> BreakerSnapshot {
		let inner = self.lock();
		let now = Instant::now();

		BreakerSnapshot {
			state: inner.state,
			consecutive_failures: inner.consecutive_failures,
			cooldown_ms: crate::millis(inner.cooldown),
			retry_after_ms: match inner.state {
				BreakerState::Open =>
					inner.open_until.map(|until| crate::millis(until.saturating_duration_since(now))),
				_ => None,
			},
		}
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn record_success(&self, trial: bool) {
		let mut inner = self.lock();

		if trial {
			inner.trial_in_flight = false;
			inner.state = BreakerState::Closed;
			inner.cooldown = self.base_cooldown;
			inner.open_until = None;

			tracing::info!(breaker_state = "CLOSED", "Circuit breaker closed after trial call.");
		}
		if inner.state == BreakerState::Closed {
			inner.consecutive_failures = 0;
		}
	}

	fn record_failure(&self, trial: bool) {
		let mut inner = self.lock();
		let now = Instant::now();

		inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

		if trial {
			let extended = inner.cooldown.mul_f64(self.cooldown_multiplier).min(self.max_cooldown);

			inner.trial_in_flight = false;
			inner.cooldown = extended;
			inner.state = BreakerState::Open;
			inner.open_until = Some(now + extended);

			tracing::warn!(
				breaker_state = "OPEN",
				cooldown_ms = crate::millis(extended),
				"Circuit breaker trial call failed."
			);

			return;
		}
		if inner.state == BreakerState::Closed && inner.consecutive_failures > self.failure_threshold
		{
			inner.state = BreakerState::Open;
			inner.open_until = Some(now + inner.cooldown);

			tracing::warn!(
				breaker_state = "OPEN",
				consecutive_failures = inner.consecutive_failures,
				cooldown_ms = crate::millis(inner.cooldown),
				"Circuit breaker opened."
			);
		}
	}

	fn release_trial(&self) {
		self.lock().trial_in_flight = false;
	}
}

/// Admission for one guarded call. Dropping it without a verdict leaves the failure count
/// untouched and frees the trial slot.
#[must_use]
pub struct BreakerPermit<'a> {
	breaker: &'a CircuitBreaker,
	trial: bool,
	settled: bool,
}
impl<'a> BreakerPermit<'a> {
	fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
		Self { breaker, trial, settled: false }
	}

	pub fn is_trial(&self) -> bool {
		self.trial
	}

	pub fn success(mut self) {
		self.settled = true;
		self.breaker.record_success(self.trial);
	}

	pub fn failure(mut self) {
		self.settled = true;
		self.breaker.record_failure(self.trial);
	}
}
impl Drop for BreakerPermit<'_> {
	fn drop(&mut self) {
		if !self.settled && self.trial {
			self.breaker.release_trial();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn breaker(failure_threshold: u32) -> CircuitBreaker {
		CircuitBreaker::new(&Breaker {
			failure_threshold,
			cooldown_ms: 1_000,
			cooldown_multiplier: 2.0,
			max_cooldown_ms: 3_000,
		})
	}

	fn fail(breaker: &CircuitBreaker, times: u32) {
		for _ in 0..times {
			breaker.try_acquire().expect("breaker should admit").failure();
		}
	}

	#[tokio::test(start_paused = true)]
	async fn opens_after_exceeding_threshold() {
		let breaker = breaker(3);

		fail(&breaker, 3);

		assert_eq!(breaker.state(), BreakerState::Closed);

		fail(&breaker, 1);

		assert_eq!(breaker.state(), BreakerState::Open);
		assert!(matches!(breaker.try_acquire(), Err(FetchError::BreakerOpen { retry_after_ms: 1_000 })));
	}

	#[tokio::test(start_paused = true)]
	async fn success_resets_the_failure_streak() {
		let breaker = breaker(2);

		fail(&breaker, 2);
		breaker.try_acquire().expect("breaker should admit").success();
		fail(&breaker, 2);

		assert_eq!(breaker.state(), BreakerState::Closed);
		assert_eq!(breaker.snapshot().consecutive_failures, 2);
	}

	#[tokio::test(start_paused = true)]
	async fn half_open_admits_a_single_trial() {
		let breaker = breaker(0);

		fail(&breaker, 1);
		tokio::time::advance(Duration::from_millis(1_000)).await;

		let trial = breaker.try_acquire().expect("cooldown elapsed");

		assert!(trial.is_trial());
		assert_eq!(breaker.state(), BreakerState::HalfOpen);
		assert!(breaker.try_acquire().is_err());

		trial.success();

		assert_eq!(breaker.state(), BreakerState::Closed);
		assert!(breaker.try_acquire().is_ok());
	}

	#[tokio::test(start_paused = true)]
	async fn failed_trial_reopens_with_extended_capped_cooldown() {
		let breaker = breaker(0);

		fail(&breaker, 1);

		for expected_ms in [2_000, 3_000, 3_000] {
			tokio::time::advance(Duration::from_secs(10)).await;

			breaker.try_acquire().expect("cooldown elapsed").failure();

			let snapshot = breaker.snapshot();

			assert_eq!(snapshot.state, BreakerState::Open);
			assert_eq!(snapshot.cooldown_ms, expected_ms);
		}
	}

	#[tokio::test(start_paused = true)]
	async fn abandoned_trial_frees_the_slot() {
		let breaker = breaker(0);

		fail(&breaker, 1);
		tokio::time::advance(Duration::from_millis(1_000)).await;
		drop(breaker.try_acquire().expect("cooldown elapsed"));

		assert_eq!(breaker.state(), BreakerState::HalfOpen);
		assert!(breaker.try_acquire().expect("slot should be free").is_trial());
	}
}
