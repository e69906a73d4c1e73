use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use keyrank_config::SearchIndexProviderConfig;

const MAX_ERROR_BODY_CHARS: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
	pub term: &'a str,
	pub market: &'a str,
	pub platform: &'a str,
}

/// One page of index results plus the index's own count of every match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
	/// Total number of matches the index reports for the term. Independent of the page size.
	pub total_matches: u64,
	pub app_ids: Vec<String>,
}
impl SearchPage {
	/// 1-based rank of `app_id` inside the returned window.
	pub fn position_of(&self, app_id: &str) -> Option<u32> {
		self.app_ids.iter().position(|id| id == app_id).and_then(|index| u32::try_from(index + 1).ok())
	}
}

/// Marketplace search index client. Reuses one connection pool across calls.
#[derive(Debug, Clone)]
pub struct SearchIndexClient {
	client: Client,
}
impl SearchIndexClient {
	pub fn new(cfg: &SearchIndexProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { client })
	}

	pub async fn search(
		&self,
		cfg: &SearchIndexProviderConfig,
		query: SearchQuery<'_>,
	) -> Result<SearchPage> {
		let url = format!("{}{}", cfg.api_base, cfg.path);
		let limit = cfg.result_window.to_string();
		let res = self
			.client
			.get(url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.query(&[
				("term", query.term),
				("country", query.market),
				("platform", query.platform),
				("limit", limit.as_str()),
			])
			.send()
			.await
			.map_err(Error::from_send)?;
		let status = res.status();

		if !status.is_success() {
			let body = res.text().await.unwrap_or_default();

			return Err(Error::Http {
				status: status.as_u16(),
				message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
			});
		}

		let json: Value = res.json().await.map_err(|err| {
			if err.is_timeout() {
				Error::Timeout
			} else {
				Error::InvalidResponse { message: format!("Search response is not JSON: {err}") }
			}
		})?;

		parse_search_response(json)
	}
}

pub fn parse_search_response(json: Value) -> Result<SearchPage> {
	let total_matches = json
		.get("total_matches")
		.ok_or_else(|| Error::InvalidResponse {
			message: "Search response is missing total_matches.".to_string(),
		})?
		.as_u64()
		.ok_or_else(|| Error::InvalidResponse {
			message: "Search response total_matches must be a non-negative integer.".to_string(),
		})?;
	let results = json.get("results").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Search response is missing results array.".to_string() }
	})?;
	let mut app_ids = Vec::with_capacity(results.len());

	for item in results {
		let app_id = match item.get("app_id") {
			Some(Value::String(id)) => id.clone(),
			Some(Value::Number(id)) => id.to_string(),
			_ =>
				return Err(Error::InvalidResponse {
					message: "Search result is missing app_id.".to_string(),
				}),
		};

		app_ids.push(app_id);
	}

	Ok(SearchPage { total_matches, app_ids })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn total_matches_is_read_from_the_index_not_the_window() {
		let results: Vec<Value> =
			(0..100).map(|i| serde_json::json!({ "app_id": format!("app-{i}") })).collect();
		let json = serde_json::json!({ "total_matches": 245, "results": results });
		let page = parse_search_response(json).expect("parse failed");

		assert_eq!(page.total_matches, 245);
		assert_eq!(page.app_ids.len(), 100);
	}

	#[test]
	fn missing_total_is_an_error_not_a_default() {
		let json = serde_json::json!({ "results": [{ "app_id": "a" }] });
		let err = parse_search_response(json).expect_err("expected invalid response");

		assert!(matches!(err, Error::InvalidResponse { .. }));
		assert!(!err.is_transient());
	}

	#[test]
	fn negative_total_is_rejected() {
		let json = serde_json::json!({ "total_matches": -1, "results": [] });

		assert!(parse_search_response(json).is_err());
	}

	#[test]
	fn position_is_one_based_and_accepts_numeric_ids() {
		let json = serde_json::json!({
			"total_matches": 3,
			"results": [{ "app_id": 11 }, { "app_id": "22" }, { "app_id": 33 }]
		});
		let page = parse_search_response(json).expect("parse failed");

		assert_eq!(page.position_of("11"), Some(1));
		assert_eq!(page.position_of("33"), Some(3));
		assert_eq!(page.position_of("44"), None);
	}

	#[test]
	fn classifies_transient_statuses() {
		let http = |status| Error::Http { status, message: String::new() };

		assert!(http(429).is_transient());
		assert!(http(408).is_transient());
		assert!(http(503).is_transient());
		assert!(!http(400).is_transient());
		assert!(!http(404).is_transient());
		assert!(Error::Timeout.is_transient());
	}
}
