use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
	Ios,
	Android,
}
impl Platform {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ios => "ios",
			Self::Android => "android",
		}
	}
}
impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Platform {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"ios" => Ok(Self::Ios),
			"android" => Ok(Self::Android),
			_ => Err(Error::Validation {
				field: "platform".to_string(),
				message: format!("must be ios or android, got {raw:?}."),
			}),
		}
	}
}

/// Identity of one ranking lookup: where `app_id` ranks for `combo_text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RankingKey {
	pub app_id: String,
	pub combo_text: String,
	pub market: String,
	pub platform: Platform,
}
impl RankingKey {
	/// Trims identifiers and lowercases the market. Blank identifiers are rejected.
	pub fn new(app_id: &str, combo_text: &str, market: &str, platform: Platform) -> Result<Self> {
		let app_id = app_id.trim();
		let combo_text = combo_text.trim();
		let market = market.trim().to_ascii_lowercase();

		for (field, value) in
			[("app_id", app_id), ("combo_text", combo_text), ("market", market.as_str())]
		{
			if value.is_empty() {
				return Err(Error::Validation {
					field: field.to_string(),
					message: "must be non-empty.".to_string(),
				});
			}
		}

		Ok(Self {
			app_id: app_id.to_string(),
			combo_text: combo_text.to_string(),
			market,
			platform,
		})
	}

	/// `appId:comboText:market:platform`, the in-flight deduplication key.
	pub fn request_key(&self) -> String {
		format!("{}:{}:{}:{}", self.app_id, self.combo_text, self.market, self.platform)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_key_joins_identity_fields() {
		let key = RankingKey::new(" 123 ", "sleep timer", "US", Platform::Ios)
			.expect("key should be valid");

		assert_eq!(key.request_key(), "123:sleep timer:us:ios");
	}

	#[test]
	fn blank_market_is_rejected() {
		let err = RankingKey::new("123", "sleep timer", "  ", Platform::Android)
			.expect_err("expected validation error");

		assert!(matches!(err, Error::Validation { ref field, .. } if field == "market"));
	}

	#[test]
	fn parses_platform_case_insensitively() {
		assert_eq!("Android".parse::<Platform>().ok(), Some(Platform::Android));
		assert!("web".parse::<Platform>().is_err());
	}
}
