use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::{
	FetchError, FetchOutcome, KeyrankService,
	resilience::{BreakerSnapshot, BreakerState, RateLimiterSnapshot},
};

/// Process-wide counters. Written by the orchestrator, read by the admin surface.
#[derive(Debug, Default)]
pub struct Metrics {
	requests: AtomicU64,
	cache_hits: AtomicU64,
	cache_misses: AtomicU64,
	external_calls: AtomicU64,
	retries: AtomicU64,
	fetch_successes: AtomicU64,
	fetch_errors: AtomicU64,
	breaker_rejections: AtomicU64,
	rate_limited: AtomicU64,
	deduplicated: AtomicU64,
}
impl Metrics {
	pub(crate) fn record_request(&self, cache_hits: usize, cache_misses: usize) {
		self.requests.fetch_add(1, Ordering::Relaxed);
		self.cache_hits.fetch_add(cache_hits as u64, Ordering::Relaxed);
		self.cache_misses.fetch_add(cache_misses as u64, Ordering::Relaxed);
	}

	pub(crate) fn record_call(&self, attempt: u32) {
		self.external_calls.fetch_add(1, Ordering::Relaxed);

		if attempt > 1 {
			self.retries.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_deduplicated(&self) {
		self.deduplicated.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_outcome(&self, outcome: &FetchOutcome) {
		let counter = match outcome {
			Ok(_) => &self.fetch_successes,
			Err(err) => {
				match err {
					FetchError::BreakerOpen { .. } => {
						self.breaker_rejections.fetch_add(1, Ordering::Relaxed);
					},
					FetchError::RateLimitExceeded { .. } => {
						self.rate_limited.fetch_add(1, Ordering::Relaxed);
					},
					_ => {},
				}

				&self.fetch_errors
			},
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn external_calls(&self) -> u64 {
		self.external_calls.load(Ordering::Relaxed)
	}

	pub fn counters(&self) -> MetricCounters {
		MetricCounters {
			requests: self.requests.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			cache_misses: self.cache_misses.load(Ordering::Relaxed),
			external_calls: self.external_calls.load(Ordering::Relaxed),
			retries: self.retries.load(Ordering::Relaxed),
			fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
			fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
			breaker_rejections: self.breaker_rejections.load(Ordering::Relaxed),
			rate_limited: self.rate_limited.load(Ordering::Relaxed),
			deduplicated: self.deduplicated.load(Ordering::Relaxed),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricCounters {
	pub requests: u64,
	pub cache_hits: u64,
	pub cache_misses: u64,
	pub external_calls: u64,
	pub retries: u64,
	pub fetch_successes: u64,
	pub fetch_errors: u64,
	pub breaker_rejections: u64,
	pub rate_limited: u64,
	pub deduplicated: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
	#[serde(flatten)]
	pub counters: MetricCounters,
	pub cache_hit_rate: f64,
	pub success_rate: f64,
	pub breaker: BreakerSnapshot,
	pub rate_limiter: RateLimiterSnapshot,
	pub in_flight: usize,
}

/// Per-request phase timings and outcome counts, logged when the request finishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestReport {
	pub combos_requested: usize,
	pub cache_hits: usize,
	pub cache_misses: usize,
	pub fetched: usize,
	pub errors: usize,
	pub cache_lookup_ms: u64,
	pub fetch_ms: u64,
	pub total_ms: u64,
	pub cache_hit_rate: f64,
	pub success_rate: f64,
	pub breaker_state: BreakerState,
}
impl RequestReport {
	pub(crate) fn log(&self) {
		tracing::info!(
			combos_requested = self.combos_requested,
			cache_hits = self.cache_hits,
			cache_misses = self.cache_misses,
			fetched = self.fetched,
			errors = self.errors,
			cache_lookup_ms = self.cache_lookup_ms,
			fetch_ms = self.fetch_ms,
			total_ms = self.total_ms,
			cache_hit_rate = self.cache_hit_rate,
			success_rate = self.success_rate,
			breaker_state = self.breaker_state.as_str(),
			"Ranking request finished."
		);
	}
}

impl KeyrankService {
	pub fn metrics(&self) -> MetricsSnapshot {
		let counters = self.metrics.counters();
		let resilience = self.orchestrator.resilience();

		MetricsSnapshot {
			counters,
			cache_hit_rate: rate(counters.cache_hits, counters.cache_hits + counters.cache_misses),
			success_rate: rate(
				counters.fetch_successes,
				counters.fetch_successes + counters.fetch_errors,
			),
			breaker: resilience.breaker.snapshot(),
			rate_limiter: resilience.limiter.snapshot(),
			in_flight: resilience.inflight.len(),
		}
	}
}

/// `part / whole`, or 0 before anything was counted.
pub fn rate(part: u64, whole: u64) -> f64 {
	if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rates_are_zero_before_traffic() {
		assert_eq!(rate(0, 0), 0.0);
		assert_eq!(rate(3, 4), 0.75);
	}

	#[test]
	fn outcomes_feed_the_matching_counters() {
		let metrics = Metrics::default();

		metrics.record_outcome(&Err(FetchError::BreakerOpen { retry_after_ms: 10 }));
		metrics.record_outcome(&Err(FetchError::RateLimitExceeded { waited_ms: 5 }));
		metrics.record_call(1);
		metrics.record_call(2);

		let counters = metrics.counters();

		assert_eq!(counters.fetch_errors, 2);
		assert_eq!(counters.breaker_rejections, 1);
		assert_eq!(counters.rate_limited, 1);
		assert_eq!(counters.external_calls, 2);
		assert_eq!(counters.retries, 1);
	}
}
