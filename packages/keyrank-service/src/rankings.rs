use std::{
	collections::{HashMap, HashSet},
	time::Instant,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
	AnalyzeRequest, Error, FetchError, KeyrankService, RankingSnapshot, RequestReport, Result,
	metrics,
};
use keyrank_domain::{AnalysisSummary, Combo, ComboAnalysis, Platform, RankingKey, token};

const DEFAULT_FETCH_LIMIT: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct RankingsRequest {
	pub app_id: String,
	pub market: String,
	pub platform: Platform,
	pub combos: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
	Cache,
	Fetched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
	pub combo_text: String,
	pub error_code: String,
	pub message: String,
	pub error: FetchError,
}
impl ErrorEntry {
	fn new(combo_text: String, error: FetchError) -> Self {
		Self {
			combo_text,
			error_code: error.code().to_string(),
			message: error.to_string(),
			error,
		}
	}
}

/// Ranking of one combo, or the reason there is none. A failed lookup is never a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RankingEntry {
	Snapshot {
		combo_text: String,
		source: EntrySource,
		#[serde(flatten)]
		snapshot: RankingSnapshot,
	},
	Error(ErrorEntry),
}
impl RankingEntry {
	pub fn combo_text(&self) -> &str {
		match self {
			Self::Snapshot { combo_text, .. } => combo_text,
			Self::Error(entry) => &entry.combo_text,
		}
	}

	pub fn snapshot(&self) -> Option<&RankingSnapshot> {
		match self {
			Self::Snapshot { snapshot, .. } => Some(snapshot),
			Self::Error(_) => None,
		}
	}

	pub fn error(&self) -> Option<&FetchError> {
		match self {
			Self::Snapshot { .. } => None,
			Self::Error(entry) => Some(&entry.error),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingsResponse {
	pub app_id: String,
	pub market: String,
	pub platform: Platform,
	pub entries: Vec<RankingEntry>,
	pub report: RequestReport,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeAndFetchRequest {
	#[serde(flatten)]
	pub analyze: AnalyzeRequest,
	pub app_id: String,
	pub market: String,
	pub platform: Platform,
	/// How many top-priority combos get a live ranking. Defaults to 50.
	#[serde(default)]
	pub fetch_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCombo {
	#[serde(flatten)]
	pub analysis: ComboAnalysis,
	pub ranking: Option<RankingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeAndFetchResponse {
	pub combos: Vec<RankedCombo>,
	pub summary: AnalysisSummary,
	pub report: RequestReport,
}

impl KeyrankService {
	/// Cached rankings for every distinct combo, fetching the misses. Entries follow the order
	/// in which combos were first requested.
	pub async fn fetch_rankings(&self, req: RankingsRequest) -> Result<RankingsResponse> {
		let keys = self.ranking_keys(&req)?;
		let (entries, report) = self.rankings_for(keys).await;

		Ok(RankingsResponse {
			app_id: req.app_id.trim().to_string(),
			market: req.market.trim().to_ascii_lowercase(),
			platform: req.platform,
			entries,
			report,
		})
	}

	/// Resolves already-normalized keys through the cache and the orchestrator. Entries keep the
	/// order of `keys`.
	async fn rankings_for(&self, keys: Vec<RankingKey>) -> (Vec<RankingEntry>, RequestReport) {
		let started = Instant::now();
		let lookup_started = Instant::now();
		let cached = match self.store.get_many(&keys, OffsetDateTime::now_utc()).await {
			Ok(cached) => cached,
			Err(err) => {
				tracing::warn!(
					combos = keys.len(),
					error = %err,
					"Ranking cache lookup failed. Treating every combo as a miss."
				);

				Default::default()
			},
		};
		let cache_lookup_ms = crate::millis(lookup_started.elapsed());
		let misses: Vec<RankingKey> =
			keys.iter().filter(|key| !cached.contains_key(*key)).cloned().collect();
		let cache_hits = keys.len() - misses.len();

		for key in &keys {
			if cached.contains_key(key) {
				tracing::info!(
					app_id = key.app_id.as_str(),
					combo_text = key.combo_text.as_str(),
					hit = true,
					"Ranking cache hit."
				);
			}
		}

		let fetch_started = Instant::now();
		let mut fetched = self.orchestrator.fetch_many(misses.clone()).await.into_iter();
		let fetch_ms = crate::millis(fetch_started.elapsed());
		let mut fetched_count = 0;
		let mut errors = 0;
		let mut entries = Vec::with_capacity(keys.len());
		let mut misses = misses.iter();

		for key in keys {
			if let Some(snapshot) = cached.get(&key) {
				entries.push(RankingEntry::Snapshot {
					combo_text: key.combo_text,
					source: EntrySource::Cache,
					snapshot: snapshot.clone(),
				});

				continue;
			}

			let outcome = match (misses.next(), fetched.next()) {
				(Some(miss), Some(outcome)) if *miss == key => outcome,
				_ => Err(FetchError::Interrupted),
			};

			match outcome {
				Ok(snapshot) => {
					fetched_count += 1;

					entries.push(RankingEntry::Snapshot {
						combo_text: key.combo_text,
						source: EntrySource::Fetched,
						snapshot,
					});
				},
				Err(err) => {
					errors += 1;

					entries.push(RankingEntry::Error(ErrorEntry::new(key.combo_text, err)));
				},
			}
		}

		let cache_misses = entries.len() - cache_hits;

		self.metrics.record_request(cache_hits, cache_misses);

		let report = RequestReport {
			combos_requested: entries.len(),
			cache_hits,
			cache_misses,
			fetched: fetched_count,
			errors,
			cache_lookup_ms,
			fetch_ms,
			total_ms: crate::millis(started.elapsed()),
			cache_hit_rate: metrics::rate(cache_hits as u64, entries.len() as u64),
			success_rate: metrics::rate(fetched_count as u64, cache_misses as u64),
			breaker_state: self.orchestrator.resilience().breaker.state(),
		};

		report.log();

		(entries, report)
	}

	/// Analyzes the metadata, then fetches rankings for the top `fetch_limit` combos.
	pub async fn analyze_and_fetch(
		&self,
		req: AnalyzeAndFetchRequest,
	) -> Result<AnalyzeAndFetchResponse> {
		let analysis = self.analyze(&req.analyze)?;
		let fetch_limit = req.fetch_limit.unwrap_or(DEFAULT_FETCH_LIMIT).min(analysis.combos.len());
		let keys = analysis.combos[..fetch_limit]
			.iter()
			.map(|entry| {
				RankingKey::new(&req.app_id, entry.combo.text(), &req.market, req.platform)
			})
			.collect::<keyrank_domain::Result<Vec<_>>>()?;
		let (entries, report) = self.rankings_for(keys).await;
		let mut by_text: HashMap<String, RankingEntry> =
			entries.into_iter().map(|entry| (entry.combo_text().to_string(), entry)).collect();
		let combos = analysis
			.combos
			.into_iter()
			.enumerate()
			.map(|(index, entry)| {
				let ranking =
					if index < fetch_limit { by_text.remove(entry.combo.text()) } else { None };

				RankedCombo { analysis: entry, ranking }
			})
			.collect();

		Ok(AnalyzeAndFetchResponse { combos, summary: analysis.summary, report })
	}

	fn ranking_keys(&self, req: &RankingsRequest) -> Result<Vec<RankingKey>> {
		let mut seen = HashSet::new();
		let mut keys = Vec::with_capacity(req.combos.len());

		for raw in &req.combos {
			let combo = Combo::from_phrase(token::phrase_words(raw), self.cfg.combos.max_length)?;

			if !seen.insert(combo.text().to_string()) {
				continue;
			}

			keys.push(RankingKey::new(&req.app_id, combo.text(), &req.market, req.platform)?);
		}

		if keys.len() > self.cfg.combos.retained_limit {
			return Err(Error::InvalidRequest {
				message: format!(
					"at most {} combos may be fetched per request, got {}.",
					self.cfg.combos.retained_limit,
					keys.len()
				),
			});
		}

		Ok(keys)
	}
}
