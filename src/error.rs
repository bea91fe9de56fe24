//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the payload state machine crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("Configuration invalid for {field}: {reason}")]
	Config { field: &'static str, reason: String },
	#[error("Metrics error: {0}")]
	Metrics(String),
}
#[cfg(feature = "metrics")]
impl<T> From<metrics::SetRecorderError<T>> for Error
where
	T: std::fmt::Display,
{
	fn from(value: metrics::SetRecorderError<T>) -> Self {
		Self::Metrics(value.to_string())
	}
}
