pub mod analyze;
pub mod fetch;
pub mod metrics;
pub mod rankings;
pub mod resilience;
pub mod retry;
pub mod store;

mod error;

pub use analyze::{AnalyzeRequest, AnalyzeResponse};
pub use error::{Error, FetchError, Result};
pub use fetch::FetchOrchestrator;
pub use metrics::{Metrics, MetricsSnapshot, RequestReport};
pub use rankings::{
	AnalyzeAndFetchRequest, AnalyzeAndFetchResponse, EntrySource, ErrorEntry, RankedCombo,
	RankingEntry, RankingsRequest, RankingsResponse,
};
pub use resilience::ResilienceCoordinator;
pub use store::{MemoryRankingStore, PgRankingStore};

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use keyrank_config::{Config, SearchIndexProviderConfig};
use keyrank_domain::RankingKey;
use keyrank_providers::search_index::{SearchIndexClient, SearchPage, SearchQuery};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one ranking lookup, shared with every caller waiting on the same key.
pub type FetchOutcome = std::result::Result<RankingSnapshot, FetchError>;

/// Snapshots expire exactly this long after they were fetched.
pub const SNAPSHOT_TTL: time::Duration = time::Duration::hours(24);

pub trait SearchIndexProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a SearchIndexProviderConfig,
		query: SearchQuery<'a>,
	) -> BoxFuture<'a, keyrank_providers::Result<SearchPage>>;
}

pub trait RankingStore
where
	Self: Send + Sync,
{
	/// Fresh snapshots for `keys` in one round trip. Misses are absent from the map.
	fn get_many<'a>(
		&'a self,
		keys: &'a [RankingKey],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<HashMap<RankingKey, RankingSnapshot>>>;

	/// Atomically replaces the snapshot stored for `key`.
	fn put_one<'a>(
		&'a self,
		key: &'a RankingKey,
		snapshot: &'a RankingSnapshot,
	) -> BoxFuture<'a, Result<()>>;
}

/// Where an app ranks for a combo, as last reported by the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingSnapshot {
	/// 1-based rank inside the result window. `None` means the app does not rank.
	pub position: Option<u32>,
	/// The index's own count of matches, unrelated to the requested window size.
	pub total_result_count: u64,
	#[serde(with = "time::serde::rfc3339")]
	pub fetched_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub ttl_expires_at: OffsetDateTime,
}
impl RankingSnapshot {
	pub fn new(position: Option<u32>, total_result_count: u64, fetched_at: OffsetDateTime) -> Self {
		Self { position, total_result_count, fetched_at, ttl_expires_at: fetched_at + SNAPSHOT_TTL }
	}

	pub fn from_page(app_id: &str, page: &SearchPage, fetched_at: OffsetDateTime) -> Self {
		Self::new(page.position_of(app_id), page.total_matches, fetched_at)
	}

	pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
		self.ttl_expires_at > now
	}
}

pub struct KeyrankService {
	pub cfg: Config,
	pub store: Arc<dyn RankingStore>,
	pub orchestrator: Arc<FetchOrchestrator>,
	pub metrics: Arc<Metrics>,
}
impl KeyrankService {
	pub fn new(cfg: Config, store: Arc<dyn RankingStore>) -> Result<Self> {
		let provider = Arc::new(DefaultSearchIndex::new(&cfg.providers.search_index)?);

		Self::with_provider(cfg, store, provider)
	}

	pub fn with_provider(
		cfg: Config,
		store: Arc<dyn RankingStore>,
		provider: Arc<dyn SearchIndexProvider>,
	) -> Result<Self> {
		let resilience = Arc::new(ResilienceCoordinator::new(&cfg.fetch)?);
		let metrics = Arc::new(Metrics::default());
		let orchestrator = Arc::new(FetchOrchestrator::new(
			&cfg,
			provider,
			Arc::clone(&store),
			resilience,
			Arc::clone(&metrics),
		));

		Ok(Self { cfg, store, orchestrator, metrics })
	}
}

struct DefaultSearchIndex {
	client: SearchIndexClient,
}
impl DefaultSearchIndex {
	fn new(cfg: &SearchIndexProviderConfig) -> Result<Self> {
		Ok(Self { client: SearchIndexClient::new(cfg)? })
	}
}
impl SearchIndexProvider for DefaultSearchIndex {
	fn search<'a>(
		&'a self,
		cfg: &'a SearchIndexProviderConfig,
		query: SearchQuery<'a>,
	) -> BoxFuture<'a, keyrank_providers::Result<SearchPage>> {
		Box::pin(self.client.search(cfg, query))
	}
}

pub(crate) fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
