pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Search index request timed out.")]
	Timeout,
	#[error("Search index transport error: {message}")]
	Transport { message: String },
	#[error("Search index returned HTTP {status}: {message}")]
	Http { status: u16, message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}
impl Error {
	/// Timeouts, transport failures, throttling and server errors are worth retrying.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Timeout | Self::Transport { .. } => true,
			Self::Http { status, .. } => matches!(status, 408 | 429) || (500..600).contains(status),
			_ => false,
		}
	}

	pub(crate) fn from_send(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			return Self::Timeout;
		}
		if let Some(status) = err.status() {
			return Self::Http { status: status.as_u16(), message: err.to_string() };
		}
		if err.is_connect() || err.is_request() || err.is_body() {
			return Self::Transport { message: err.to_string() };
		}

		Self::Reqwest(err)
	}
}
