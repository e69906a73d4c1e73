use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Request-fatal failures. Per-combo fetch failures are [`FetchError`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Malformed combo: {message}")]
	MalformedCombo { message: String },
	#[error("Invalid configuration: {message}")]
	InvalidConfig { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<keyrank_domain::Error> for Error {
	fn from(err: keyrank_domain::Error) -> Self {
		match err {
			keyrank_domain::Error::Validation { .. } =>
				Self::InvalidRequest { message: err.to_string() },
			keyrank_domain::Error::MalformedCombo { message } => Self::MalformedCombo { message },
		}
	}
}

impl From<keyrank_storage::Error> for Error {
	fn from(err: keyrank_storage::Error) -> Self {
		match err {
			keyrank_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			keyrank_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
		}
	}
}

impl From<keyrank_providers::Error> for Error {
	fn from(err: keyrank_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

/// Why a single combo has no ranking. Reported next to successes, never turned into numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
	#[error("Circuit breaker is open; retry after {retry_after_ms} ms.")]
	BreakerOpen { retry_after_ms: u64 },
	#[error("Rate limiter gave no token within {waited_ms} ms.")]
	RateLimitExceeded { waited_ms: u64 },
	#[error("Fetch failed after {attempts} attempts: {message}")]
	FetchFailed { attempts: u32, message: String },
	#[error("Fetch rejected: {message}")]
	Rejected { message: String },
	#[error("Fetch task ended without a result.")]
	Interrupted,
}
impl FetchError {
	pub fn code(&self) -> &'static str {
		match self {
			Self::BreakerOpen { .. } => "BREAKER_OPEN",
			Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
			Self::FetchFailed { .. } => "FETCH_FAILED",
			Self::Rejected { .. } => "REJECTED",
			Self::Interrupted => "INTERRUPTED",
		}
	}
}
