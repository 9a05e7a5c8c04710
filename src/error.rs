use thiserror::Error;

/// The local queue could not be read or written.
#[derive(Debug, Error)]
pub enum StorageFault {
	#[error("storage I/O failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("record encoding failed: {0}")]
	Encoding(#[from] serde_json::Error),

	#[error("queue index is unreadable: {0}")]
	Index(String),

	#[error("queue was written with schema version {found}, this build understands up to {supported}")]
	IncompatibleSchema { found: i64, supported: i64 },

	#[error("storage backend unavailable: {0}")]
	Unavailable(String),

	#[error("store lock poisoned")]
	Poisoned,
}

/// A record could not be delivered to the remote endpoint.
#[derive(Debug, Error)]
pub enum TransportFault {
	#[error("request failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("endpoint rejected submission with status {status}")]
	Rejected { status: u16 },

	#[error("forward failed: {0}")]
	Other(String),
}

/// Why a submission did not go through, on either path.
#[derive(Debug, Error)]
pub enum SubmitError {
	#[error(transparent)]
	Storage(#[from] StorageFault),

	#[error(transparent)]
	Transport(#[from] TransportFault),
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file: {0}")]
	Io(#[from] std::io::Error),

	#[error("config is not valid TOML: {0}")]
	Parse(#[from] toml_edit::TomlError),

	#[error("missing required key `{0}`")]
	Missing(&'static str),

	#[error("key `{key}` must be {expected}")]
	InvalidType {
		key: &'static str,
		expected: &'static str,
	},
}
