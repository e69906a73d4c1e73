pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Invalid {field}: {message}")]
	Validation { field: String, message: String },
	#[error("Malformed combo: {message}")]
	MalformedCombo { message: String },
}
