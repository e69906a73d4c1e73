use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub combos: Combos,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub fetch: Fetch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
	Postgres,
	Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub backend: StorageBackend,
	pub postgres: Option<Postgres>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub search_index: SearchIndexProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchIndexProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	/// Requested result-window size. The index caps it on its own side and it has no relation to
	/// the reported total match count.
	#[serde(default = "default_result_window")]
	pub result_window: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Combos {
	pub max_length: usize,
	pub generation_ceiling: usize,
	pub retained_limit: usize,
	pub max_title_chars: usize,
	pub max_subtitle_chars: usize,
	pub max_keywords_chars: usize,
}
impl Default for Combos {
	fn default() -> Self {
		Self {
			max_length: 4,
			generation_ceiling: 5_000,
			retained_limit: 500,
			max_title_chars: 30,
			max_subtitle_chars: 30,
			max_keywords_chars: 100,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub weights: RankingWeights,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
	pub strength: f64,
	pub popularity: f64,
	pub opportunity: f64,
	pub trend: f64,
	pub intent: f64,
}
impl RankingWeights {
	pub fn sum(&self) -> f64 {
		self.strength + self.popularity + self.opportunity + self.trend + self.intent
	}
}
impl Default for RankingWeights {
	fn default() -> Self {
		Self { strength: 0.30, popularity: 0.25, opportunity: 0.20, trend: 0.15, intent: 0.10 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Fetch {
	/// Maximum number of external calls a single request keeps in flight.
	pub concurrency: usize,
	/// Attempts per breaker permit, including the first call.
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub call_timeout_ms: u64,
	pub rate_limit: RateLimit,
	pub breaker: Breaker,
}
impl Default for Fetch {
	fn default() -> Self {
		Self {
			concurrency: 3,
			max_attempts: 3,
			base_backoff_ms: 250,
			max_backoff_ms: 4_000,
			call_timeout_ms: 10_000,
			rate_limit: RateLimit::default(),
			breaker: Breaker::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimit {
	pub capacity: u32,
	pub refill_per_second: f64,
	pub acquire_timeout_ms: u64,
}
impl Default for RateLimit {
	fn default() -> Self {
		Self { capacity: 20, refill_per_second: 2.0, acquire_timeout_ms: 5_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Breaker {
	/// Consecutive failures tolerated while closed. The breaker opens on the next one.
	pub failure_threshold: u32,
	pub cooldown_ms: u64,
	/// Applied to the current cooldown when a half-open trial fails.
	pub cooldown_multiplier: f64,
	pub max_cooldown_ms: u64,
}
impl Default for Breaker {
	fn default() -> Self {
		Self {
			failure_threshold: 50,
			cooldown_ms: 30_000,
			cooldown_multiplier: 2.0,
			max_cooldown_ms: 300_000,
		}
	}
}

fn default_result_window() -> u32 {
	100
}
