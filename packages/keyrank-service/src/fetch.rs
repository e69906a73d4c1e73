use std::sync::Arc;

use time::OffsetDateTime;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
	FetchError, FetchOutcome, Metrics, RankingSnapshot, RankingStore, SearchIndexProvider,
	resilience::{Joined, ResilienceCoordinator},
	retry::{self, CallFailure, RetryPolicy},
};
use keyrank_config::{Config, SearchIndexProviderConfig};
use keyrank_domain::RankingKey;
use keyrank_providers::search_index::SearchQuery;

/// Runs cache misses through dedup, rate limit, breaker and retry/timeout, in that order.
pub struct FetchOrchestrator {
	provider_cfg: SearchIndexProviderConfig,
	policy: RetryPolicy,
	concurrency: usize,
	provider: Arc<dyn SearchIndexProvider>,
	store: Arc<dyn RankingStore>,
	resilience: Arc<ResilienceCoordinator>,
	metrics: Arc<Metrics>,
}
impl FetchOrchestrator {
	pub fn new(
		cfg: &Config,
		provider: Arc<dyn SearchIndexProvider>,
		store: Arc<dyn RankingStore>,
		resilience: Arc<ResilienceCoordinator>,
		metrics: Arc<Metrics>,
	) -> Self {
		Self {
			provider_cfg: cfg.providers.search_index.clone(),
			policy: RetryPolicy::new(&cfg.fetch),
			concurrency: cfg.fetch.concurrency.max(1),
			provider,
			store,
			resilience,
			metrics,
		}
	}

	pub fn resilience(&self) -> &ResilienceCoordinator {
		&self.resilience
	}

	/// Fetches every key with at most `fetch.concurrency` lookups outstanding. Outcomes keep the
	/// order of `keys`.
	///
	/// Dropping the returned future stops dispatching. Lookups already handed to the search
	/// index still finish and populate the store.
	pub async fn fetch_many(self: &Arc<Self>, keys: Vec<RankingKey>) -> Vec<FetchOutcome> {
		let semaphore = Arc::new(Semaphore::new(self.concurrency));
		let mut outcomes: Vec<Option<FetchOutcome>> = vec![None; keys.len()];
		let mut tasks = JoinSet::new();

		for (index, key) in keys.into_iter().enumerate() {
			let this = Arc::clone(self);
			let semaphore = Arc::clone(&semaphore);

			tasks.spawn(async move {
				let outcome = match semaphore.acquire_owned().await {
					Ok(_permit) => this.fetch_one(key).await,
					Err(_) => Err(FetchError::Interrupted),
				};

				(index, outcome)
			});
		}

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((index, outcome)) => outcomes[index] = Some(outcome),
				Err(err) => tracing::warn!(error = %err, "Fetch task did not finish."),
			}
		}

		outcomes
			.into_iter()
			.map(|outcome| outcome.unwrap_or(Err(FetchError::Interrupted)))
			.collect()
	}

	/// Fetches one key, sharing the result with any identical lookup already in flight.
	pub async fn fetch_one(self: &Arc<Self>, key: RankingKey) -> FetchOutcome {
		let request_key = key.request_key();

		match self.resilience.inflight.join(&request_key) {
			Joined::Leader(lease, waiter) => {
				let this = Arc::clone(self);

				// Detached so a cancelled caller never wastes a dispatched call.
				tokio::spawn(async move {
					let outcome = this.run_pipeline(&key).await;

					this.metrics.record_outcome(&outcome);
					lease.complete(outcome);
				});

				waiter.wait().await
			},
			Joined::Follower(waiter) => {
				self.metrics.record_deduplicated();

				tracing::info!(request_key = request_key.as_str(), "Joined in-flight ranking fetch.");

				waiter.wait().await
			},
		}
	}

	async fn run_pipeline(&self, key: &RankingKey) -> FetchOutcome {
		let resilience = &self.resilience;

		resilience.limiter.acquire().await?;

		let permit = resilience.breaker.try_acquire().inspect_err(|err| {
			tracing::warn!(
				app_id = key.app_id.as_str(),
				combo_text = key.combo_text.as_str(),
				error = %err,
				"Ranking fetch rejected by circuit breaker."
			);
		})?;
		let query = SearchQuery {
			term: key.combo_text.as_str(),
			market: key.market.as_str(),
			platform: key.platform.as_str(),
		};
		let mut attempt = 0;
		let result = retry::call_with_retry(&self.policy, &resilience.limiter, || {
			attempt += 1;

			self.metrics.record_call(attempt);

			self.provider.search(&self.provider_cfg, query)
		})
		.await;
		let (page, attempts) = match result {
			Ok(done) => {
				permit.success();

				done
			},
			Err(failure) => {
				let err = match failure {
					CallFailure::Exhausted { attempts, error } => {
						permit.failure();

						FetchError::FetchFailed { attempts, message: error.to_string() }
					},
					CallFailure::Rejected { error, .. } => {
						if matches!(error, keyrank_providers::Error::InvalidResponse { .. }) {
							permit.failure();
						} else {
							drop(permit);
						}

						FetchError::Rejected { message: error.to_string() }
					},
					CallFailure::Throttled { error, .. } => {
						drop(permit);

						error
					},
				};

				tracing::warn!(
					app_id = key.app_id.as_str(),
					combo_text = key.combo_text.as_str(),
					error_code = err.code(),
					error = %err,
					breaker_state = resilience.breaker.state().as_str(),
					"Ranking fetch failed."
				);

				return Err(err);
			},
		};
		let snapshot = RankingSnapshot::from_page(&key.app_id, &page, OffsetDateTime::now_utc());

		if let Err(err) = self.store.put_one(key, &snapshot).await {
			tracing::warn!(
				app_id = key.app_id.as_str(),
				combo_text = key.combo_text.as_str(),
				error = %err,
				"Failed to store ranking snapshot."
			);
		}

		tracing::info!(
			app_id = key.app_id.as_str(),
			combo_text = key.combo_text.as_str(),
			position = ?snapshot.position,
			total_result_count = snapshot.total_result_count,
			attempts,
			"Ranking fetched."
		);

		Ok(snapshot)
	}
}
