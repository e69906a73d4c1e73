use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use keyrank_config::{Config, StorageBackend};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("keyrank_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

#[test]
fn sample_config_loads_and_normalizes() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = keyrank_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Sample config must be valid.");

	assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
	assert_eq!(cfg.providers.search_index.api_base, "https://search.example.com");
	assert_eq!(cfg.providers.search_index.result_window, 100);
	assert_eq!(cfg.fetch.rate_limit.capacity, 20);
	assert_eq!(cfg.fetch.breaker.failure_threshold, 50);
}

#[test]
fn omitted_tuning_sections_fall_back_to_documented_defaults() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root.as_table_mut().expect("Template config must be a table.");

	table.remove("combos");
	table.remove("ranking");
	table.remove("fetch");

	let cfg: Config = toml::from_str(&toml::to_string(&root).expect("Failed to render config."))
		.expect("Failed to parse trimmed config.");

	assert!(keyrank_config::validate(&cfg).is_ok());
	assert_eq!(cfg.combos.max_length, 4);
	assert_eq!(cfg.combos.generation_ceiling, 5_000);
	assert_eq!(cfg.combos.retained_limit, 500);
	assert_eq!(cfg.fetch.rate_limit.capacity, 20);
	assert_eq!(cfg.fetch.rate_limit.refill_per_second, 2.0);
	assert_eq!(cfg.fetch.breaker.failure_threshold, 50);
	assert_eq!(cfg.fetch.breaker.cooldown_ms, 30_000);
	assert!((cfg.ranking.weights.sum() - 1.0).abs() < 1e-9);
}

#[test]
fn postgres_backend_requires_postgres_section() {
	let mut cfg = base_config();

	cfg.storage.postgres = None;

	let err = keyrank_config::validate(&cfg).expect_err("Expected storage validation error.");

	assert!(
		err.to_string()
			.contains("storage.postgres is required when storage.backend is postgres."),
		"Unexpected error: {err}"
	);

	cfg.storage.backend = StorageBackend::Memory;

	assert!(keyrank_config::validate(&cfg).is_ok());
}

#[test]
fn result_window_must_be_bounded() {
	let payload =
		sample_toml_with("providers.search_index", "result_window", Value::Integer(500));
	let path = write_temp_config(payload);
	let result = keyrank_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected result_window validation error.");

	assert!(
		err.to_string()
			.contains("providers.search_index.result_window must be in the range 1-200."),
		"Unexpected error: {err}"
	);
}

#[test]
fn ranking_weights_must_sum_to_one() {
	let payload = sample_toml_with("ranking.weights", "strength", Value::Float(0.5));
	let path = write_temp_config(payload);
	let result = keyrank_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected weight sum validation error.");

	assert!(
		err.to_string().contains("ranking.weights must sum to 1.0."),
		"Unexpected error: {err}"
	);
}

#[test]
fn ranking_weights_must_be_non_negative() {
	let mut cfg = base_config();

	cfg.ranking.weights.trend = -0.15;
	cfg.ranking.weights.strength = 0.60;

	let err = keyrank_config::validate(&cfg).expect_err("Expected weight validation error.");

	assert!(
		err.to_string().contains("ranking.weights.trend must be zero or greater."),
		"Unexpected error: {err}"
	);
}

#[test]
fn combo_length_and_limits_are_validated() {
	let mut cfg = base_config();

	cfg.combos.max_length = 1;

	let err = keyrank_config::validate(&cfg).expect_err("Expected max_length validation error.");

	assert!(
		err.to_string().contains("combos.max_length must be in the range 2-6."),
		"Unexpected error: {err}"
	);

	cfg = base_config();
	cfg.combos.retained_limit = 6_000;

	let err =
		keyrank_config::validate(&cfg).expect_err("Expected retained_limit validation error.");

	assert!(
		err.to_string().contains("combos.retained_limit must not exceed combos.generation_ceiling."),
		"Unexpected error: {err}"
	);
}

#[test]
fn breaker_cooldown_bounds_are_validated() {
	let mut cfg = base_config();

	cfg.fetch.breaker.max_cooldown_ms = 1_000;

	let err = keyrank_config::validate(&cfg).expect_err("Expected cooldown validation error.");

	assert!(
		err.to_string().contains(
			"fetch.breaker.max_cooldown_ms must be greater than or equal to fetch.breaker.cooldown_ms."
		),
		"Unexpected error: {err}"
	);

	cfg = base_config();
	cfg.fetch.breaker.cooldown_multiplier = 0.5;

	let err = keyrank_config::validate(&cfg).expect_err("Expected multiplier validation error.");

	assert!(
		err.to_string().contains("fetch.breaker.cooldown_multiplier must be a finite number"),
		"Unexpected error: {err}"
	);
}

#[test]
fn rate_limit_refill_must_be_positive() {
	let mut cfg = base_config();

	cfg.fetch.rate_limit.refill_per_second = 0.0;

	let err = keyrank_config::validate(&cfg).expect_err("Expected refill validation error.");

	assert!(
		err.to_string()
			.contains("fetch.rate_limit.refill_per_second must be a positive finite number."),
		"Unexpected error: {err}"
	);
}

#[test]
fn fetch_concurrency_must_be_bounded() {
	let mut cfg = base_config();

	cfg.fetch.concurrency = 0;

	let err = keyrank_config::validate(&cfg).expect_err("Expected concurrency validation error.");

	assert!(
		err.to_string().contains("fetch.concurrency must be in the range 1-16."),
		"Unexpected error: {err}"
	);
}

#[test]
fn provider_api_key_must_be_non_empty() {
	let payload = sample_toml_with("providers.search_index", "api_key", Value::String(" ".into()));
	let path = write_temp_config(payload);
	let result = keyrank_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("providers.search_index.api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}
