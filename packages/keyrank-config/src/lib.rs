mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Breaker, Combos, Config, Fetch, Postgres, Providers, Ranking, RankingWeights, RateLimit,
	SearchIndexProviderConfig, Service, Storage, StorageBackend,
};

use std::{fs, path::Path};

const MAX_RESULT_WINDOW: u32 = 200;
const MAX_FETCH_CONCURRENCY: usize = 16;
const MAX_COMBO_LENGTH: usize = 6;
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.backend == StorageBackend::Postgres {
		let Some(postgres) = cfg.storage.postgres.as_ref() else {
			return Err(Error::Validation {
				message: "storage.postgres is required when storage.backend is postgres."
					.to_string(),
			});
		};

		if postgres.dsn.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.postgres.dsn must be non-empty.".to_string(),
			});
		}
		if postgres.pool_max_conns == 0 {
			return Err(Error::Validation {
				message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
			});
		}
	}

	validate_search_index(&cfg.providers.search_index)?;
	validate_combos(&cfg.combos)?;
	validate_weights(&cfg.ranking.weights)?;
	validate_fetch(&cfg.fetch)?;

	Ok(())
}

fn validate_search_index(provider: &SearchIndexProviderConfig) -> Result<()> {
	for (label, value) in [
		("providers.search_index.provider_id", &provider.provider_id),
		("providers.search_index.api_base", &provider.api_base),
		("providers.search_index.api_key", &provider.api_key),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if provider.result_window == 0 || provider.result_window > MAX_RESULT_WINDOW {
		return Err(Error::Validation {
			message: format!(
				"providers.search_index.result_window must be in the range 1-{MAX_RESULT_WINDOW}."
			),
		});
	}
	if provider.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.search_index.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for value in provider.default_headers.values() {
		if !value.is_string() {
			return Err(Error::Validation {
				message: "providers.search_index.default_headers values must be strings."
					.to_string(),
			});
		}
	}

	Ok(())
}

fn validate_combos(combos: &Combos) -> Result<()> {
	if !(2..=MAX_COMBO_LENGTH).contains(&combos.max_length) {
		return Err(Error::Validation {
			message: format!("combos.max_length must be in the range 2-{MAX_COMBO_LENGTH}."),
		});
	}
	if combos.generation_ceiling == 0 {
		return Err(Error::Validation {
			message: "combos.generation_ceiling must be greater than zero.".to_string(),
		});
	}
	if combos.retained_limit == 0 {
		return Err(Error::Validation {
			message: "combos.retained_limit must be greater than zero.".to_string(),
		});
	}
	if combos.retained_limit > combos.generation_ceiling {
		return Err(Error::Validation {
			message: "combos.retained_limit must not exceed combos.generation_ceiling.".to_string(),
		});
	}

	for (label, value) in [
		("combos.max_title_chars", combos.max_title_chars),
		("combos.max_subtitle_chars", combos.max_subtitle_chars),
		("combos.max_keywords_chars", combos.max_keywords_chars),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn validate_weights(weights: &RankingWeights) -> Result<()> {
	for (label, value) in [
		("ranking.weights.strength", weights.strength),
		("ranking.weights.popularity", weights.popularity),
		("ranking.weights.opportunity", weights.opportunity),
		("ranking.weights.trend", weights.trend),
		("ranking.weights.intent", weights.intent),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
		return Err(Error::Validation {
			message: "ranking.weights must sum to 1.0.".to_string(),
		});
	}

	Ok(())
}

fn validate_fetch(fetch: &Fetch) -> Result<()> {
	if fetch.concurrency == 0 || fetch.concurrency > MAX_FETCH_CONCURRENCY {
		return Err(Error::Validation {
			message: format!("fetch.concurrency must be in the range 1-{MAX_FETCH_CONCURRENCY}."),
		});
	}
	if fetch.max_attempts == 0 {
		return Err(Error::Validation {
			message: "fetch.max_attempts must be greater than zero.".to_string(),
		});
	}
	if fetch.max_backoff_ms < fetch.base_backoff_ms {
		return Err(Error::Validation {
			message: "fetch.max_backoff_ms must be greater than or equal to fetch.base_backoff_ms."
				.to_string(),
		});
	}
	if fetch.call_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "fetch.call_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if fetch.rate_limit.capacity == 0 {
		return Err(Error::Validation {
			message: "fetch.rate_limit.capacity must be greater than zero.".to_string(),
		});
	}
	if !fetch.rate_limit.refill_per_second.is_finite() || fetch.rate_limit.refill_per_second <= 0.0
	{
		return Err(Error::Validation {
			message: "fetch.rate_limit.refill_per_second must be a positive finite number."
				.to_string(),
		});
	}
	if fetch.breaker.failure_threshold == 0 {
		return Err(Error::Validation {
			message: "fetch.breaker.failure_threshold must be greater than zero.".to_string(),
		});
	}
	if fetch.breaker.cooldown_ms == 0 {
		return Err(Error::Validation {
			message: "fetch.breaker.cooldown_ms must be greater than zero.".to_string(),
		});
	}
	if !fetch.breaker.cooldown_multiplier.is_finite() || fetch.breaker.cooldown_multiplier < 1.0 {
		return Err(Error::Validation {
			message: "fetch.breaker.cooldown_multiplier must be a finite number of at least 1.0."
				.to_string(),
		});
	}
	if fetch.breaker.max_cooldown_ms < fetch.breaker.cooldown_ms {
		return Err(Error::Validation {
			message:
				"fetch.breaker.max_cooldown_ms must be greater than or equal to fetch.breaker.cooldown_ms."
					.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let api_base = cfg.providers.search_index.api_base.trim_end_matches('/').to_string();

	cfg.providers.search_index.api_base = api_base;

	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
