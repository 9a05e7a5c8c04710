use crate::{ConfigError, DirectoryConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml_edit::{DocumentMut, Item};

const DEFAULT_QUEUE_NAME: &str = "medical-forms";
const DEFAULT_STORAGE_LOCATION: &str = "intake-queue";

/// Runtime settings for the sync path.
///
/// ```toml
/// endpoint = "http://localhost:5000/medicalForm"
/// request_timeout_ms = 10000   # optional
///
/// [storage]                    # optional
/// location = "/var/lib/intake"
/// queue_name = "medical-forms"
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
	pub endpoint: String,
	pub request_timeout: Option<Duration>,
	pub storage_location: PathBuf,
	pub queue_name: String,
}

impl SyncConfig {
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path)?;
		Self::from_toml_str(&raw)
	}

	pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
		let doc = raw.parse::<DocumentMut>()?;

		let endpoint = string_key(doc.get("endpoint"), "endpoint")?
			.ok_or(ConfigError::Missing("endpoint"))?;

		let request_timeout = match doc.get("request_timeout_ms") {
			None => None,
			Some(item) => match item.as_integer() {
				Some(ms) if ms >= 0 => Some(Duration::from_millis(ms as u64)),
				_ => {
					return Err(ConfigError::InvalidType {
						key: "request_timeout_ms",
						expected: "a non-negative integer",
					})
				}
			},
		};

		let storage = doc.get("storage").and_then(Item::as_table_like);
		let storage_location = string_key(storage.and_then(|t| t.get("location")), "storage.location")?
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_LOCATION));
		let queue_name = string_key(storage.and_then(|t| t.get("queue_name")), "storage.queue_name")?
			.unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());

		Ok(Self {
			endpoint,
			request_timeout,
			storage_location,
			queue_name,
		})
	}

	pub fn directory_config(&self) -> DirectoryConfig {
		DirectoryConfig {
			queue_name: self.queue_name.clone(),
			storage_location: self.storage_location.clone(),
		}
	}
}

fn string_key(item: Option<&Item>, key: &'static str) -> Result<Option<String>, ConfigError> {
	match item {
		None => Ok(None),
		Some(item) => item
			.as_str()
			.map(|s| Some(s.to_string()))
			.ok_or(ConfigError::InvalidType {
				key,
				expected: "a string",
			}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_full_config() {
		let config = SyncConfig::from_toml_str(
			r#"
endpoint = "http://localhost:5000/medicalForm"
request_timeout_ms = 2500

[storage]
location = "/tmp/intake"
queue_name = "clinic-a"
"#,
		)
		.unwrap();

		assert_eq!(config.endpoint, "http://localhost:5000/medicalForm");
		assert_eq!(config.request_timeout, Some(Duration::from_millis(2500)));
		let dir = config.directory_config();
		assert_eq!(dir.storage_location, PathBuf::from("/tmp/intake"));
		assert_eq!(dir.queue_name, "clinic-a");
	}

	#[test]
	fn test_defaults() {
		let config = SyncConfig::from_toml_str(r#"endpoint = "https://intake.example/forms""#).unwrap();
		assert_eq!(config.request_timeout, None);
		assert_eq!(config.queue_name, DEFAULT_QUEUE_NAME);
		assert_eq!(config.storage_location, PathBuf::from(DEFAULT_STORAGE_LOCATION));
	}

	#[test]
	fn test_missing_endpoint() {
		assert!(matches!(
			SyncConfig::from_toml_str("request_timeout_ms = 10"),
			Err(ConfigError::Missing("endpoint"))
		));
	}

	#[test]
	fn test_wrong_types() {
		assert!(matches!(
			SyncConfig::from_toml_str("endpoint = 5"),
			Err(ConfigError::InvalidType { key: "endpoint", .. })
		));
		assert!(matches!(
			SyncConfig::from_toml_str("endpoint = \"x\"\nrequest_timeout_ms = -1"),
			Err(ConfigError::InvalidType { key: "request_timeout_ms", .. })
		));
	}

	#[test]
	fn test_invalid_toml() {
		assert!(matches!(
			SyncConfig::from_toml_str("endpoint = "),
			Err(ConfigError::Parse(_))
		));
	}

	#[test]
	fn test_load_from_file() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("intake.toml");
		std::fs::write(&path, "endpoint = \"http://127.0.0.1:5000/medicalForm\"\n").unwrap();

		let config = SyncConfig::load(&path).unwrap();
		assert_eq!(config.endpoint, "http://127.0.0.1:5000/medicalForm");
	}
}
