use std::{future::Future, time::Duration};

use crate::{FetchError, resilience::TokenBucket};
use keyrank_config::Fetch;

const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_backoff: Duration,
	pub max_backoff: Duration,
	pub call_timeout: Duration,
}
impl RetryPolicy {
	pub fn new(cfg: &Fetch) -> Self {
		Self {
			max_attempts: cfg.max_attempts.max(1),
			base_backoff: Duration::from_millis(cfg.base_backoff_ms),
			max_backoff: Duration::from_millis(cfg.max_backoff_ms),
			call_timeout: Duration::from_millis(cfg.call_timeout_ms),
		}
	}

	/// Delay after the failed `attempt` (1-based): base doubled per attempt, capped.
	pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_EXPONENT);

		self.base_backoff.saturating_mul(1 << exp).min(self.max_backoff)
	}
}

#[derive(Debug)]
pub enum CallFailure {
	/// Every attempt failed transiently.
	Exhausted { attempts: u32, error: keyrank_providers::Error },
	/// A non-transient failure ended the attempts early.
	Rejected { attempts: u32, error: keyrank_providers::Error },
	/// No limiter token for the next attempt.
	Throttled { attempts: u32, error: FetchError },
}

/// Runs `call` under a per-call timeout, retrying transient failures with backoff. Every retry
/// takes a fresh limiter token first.
pub async fn call_with_retry<T, F, Fut>(
	policy: &RetryPolicy,
	limiter: &TokenBucket,
	mut call: F,
) -> Result<(T, u32), CallFailure>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = keyrank_providers::Result<T>>,
{
	let mut attempt = 1;

	loop {
		let result = match tokio::time::timeout(policy.call_timeout, call()).await {
			Ok(result) => result,
			Err(_) => Err(keyrank_providers::Error::Timeout),
		};
		let error = match result {
			Ok(value) => return Ok((value, attempt)),
			Err(error) => error,
		};

		if !error.is_transient() {
			return Err(CallFailure::Rejected { attempts: attempt, error });
		}
		if attempt >= policy.max_attempts {
			return Err(CallFailure::Exhausted { attempts: attempt, error });
		}

		let backoff = policy.backoff_for_attempt(attempt);

		tracing::warn!(
			attempt,
			backoff_ms = crate::millis(backoff),
			error = %error,
			"Transient search index failure. Retrying."
		);
		tokio::time::sleep(backoff).await;
		limiter
			.acquire()
			.await
			.map_err(|error| CallFailure::Throttled { attempts: attempt, error })?;

		attempt += 1;
	}
}
