//! DirectoryStore - durable file-per-record queue for native targets
//!
//! Layout under `<storage_location>/<queue_name>/`:
//!
//! ```text
//! index.toml                 schema_version + next_id
//! 00000000000000000000.json  one file per queued record
//! 00000000000000000001.json
//! ```
//!
//! Every write goes to a `.tmp` sibling first and is renamed into place, so a
//! crash leaves either the old state or the new one. `next_id` is persisted
//! before the record file appears, which keeps ids unique across restarts.

use crate::{DataStore, Payload, QueuedRecord, RecordId, StorageFault};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use toml_edit::{value, DocumentMut};

const SCHEMA_VERSION: i64 = 1;
const INDEX_FILE: &str = "index.toml";
const RECORD_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";

/// Configuration for the directory-backed data store.
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
	/// Name of the queue; used as the subdirectory holding its records.
	/// Different queues sharing a location should use different names.
	pub queue_name: String,
	/// Parent directory for queue data.
	pub storage_location: PathBuf,
}

/// What reading one record file turned up.
enum RecordFile {
	Found(QueuedRecord),
	/// The file is gone; the id no longer names a queued record.
	Vanished,
	/// The file is there but unreadable or from a newer schema. It stays on
	/// disk for a build that can read it.
	Skipped,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
	schema_version: i64,
	#[serde(flatten)]
	record: QueuedRecord,
}

/// A durable store keeping one JSON file per queued record.
pub struct DirectoryStore {
	dir: PathBuf,
	index: DocumentMut,
	next_id: u64,
	ids: BTreeSet<RecordId>,
}

impl DirectoryStore {
	/// Opens (or creates) the queue directory and loads its index.
	///
	/// Leftover temp files from an interrupted write are discarded. If the
	/// index is missing or behind the record files on disk, `next_id` is
	/// advanced past the highest id found.
	pub fn new(config: DirectoryConfig) -> Result<Self, StorageFault> {
		let dir = config.storage_location.join(&config.queue_name);
		fs::create_dir_all(&dir)?;

		let index = Self::load_index(&dir.join(INDEX_FILE))?;
		let found = index
			.get("schema_version")
			.and_then(|item| item.as_integer())
			.unwrap_or(SCHEMA_VERSION);
		if found > SCHEMA_VERSION {
			return Err(StorageFault::IncompatibleSchema {
				found,
				supported: SCHEMA_VERSION,
			});
		}
		let indexed_next = index
			.get("next_id")
			.and_then(|item| item.as_integer())
			.map(|n| n.max(0) as u64)
			.unwrap_or(0);

		let ids = Self::scan(&dir)?;
		let next_id = ids
			.iter()
			.next_back()
			.map(|id| id.0 + 1)
			.unwrap_or(0)
			.max(indexed_next);

		let mut store = Self {
			dir,
			index,
			next_id,
			ids,
		};
		store.write_index()?;

		tracing::debug!(
			dir = %store.dir.display(),
			queued = store.ids.len(),
			next_id = store.next_id,
			"opened directory store"
		);
		Ok(store)
	}

	/// Directory holding this queue's files.
	pub fn path(&self) -> &Path {
		&self.dir
	}

	fn load_index(path: &Path) -> Result<DocumentMut, StorageFault> {
		match fs::read_to_string(path) {
			Ok(raw) => raw
				.parse::<DocumentMut>()
				.map_err(|e| StorageFault::Index(e.to_string())),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(DocumentMut::new()),
			Err(e) => Err(e.into()),
		}
	}

	fn scan(dir: &Path) -> Result<BTreeSet<RecordId>, StorageFault> {
		let mut ids = BTreeSet::new();
		for entry in fs::read_dir(dir)? {
			let path = entry?.path();
			match path.extension().and_then(|ext| ext.to_str()) {
				Some(RECORD_EXT) => {
					if let Some(id) = Self::id_from_path(&path) {
						ids.insert(id);
					}
				}
				Some(TEMP_EXT) => {
					tracing::warn!(path = %path.display(), "discarding interrupted write");
					fs::remove_file(&path)?;
				}
				_ => {}
			}
		}
		Ok(ids)
	}

	fn id_from_path(path: &Path) -> Option<RecordId> {
		path.file_stem()?.to_str()?.parse().ok().map(RecordId)
	}

	fn record_path(&self, id: RecordId) -> PathBuf {
		self.dir.join(format!("{:020}.{}", id.0, RECORD_EXT))
	}

	fn write_index(&mut self) -> Result<(), StorageFault> {
		self.index["schema_version"] = value(SCHEMA_VERSION);
		self.index["next_id"] = value(self.next_id as i64);
		write_atomic(&self.dir.join(INDEX_FILE), self.index.to_string().as_bytes())?;
		Ok(())
	}

	fn read_record(&self, id: RecordId) -> Result<RecordFile, StorageFault> {
		let path = self.record_path(id);
		let raw = match fs::read(&path) {
			Ok(raw) => raw,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				tracing::warn!(record_id = %id, "queued record vanished from disk");
				return Ok(RecordFile::Vanished);
			}
			Err(e) => return Err(e.into()),
		};

		match serde_json::from_slice::<StoredRecord>(&raw) {
			Ok(stored) if stored.schema_version > SCHEMA_VERSION => {
				tracing::warn!(
					record_id = %id,
					schema_version = stored.schema_version,
					"skipping record written by a newer schema"
				);
				Ok(RecordFile::Skipped)
			}
			Ok(stored) => Ok(RecordFile::Found(stored.record)),
			Err(e) => {
				tracing::warn!(record_id = %id, error = %e, "skipping unreadable record");
				Ok(RecordFile::Skipped)
			}
		}
	}
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
	let tmp = path.with_extension(TEMP_EXT);
	fs::write(&tmp, bytes)?;
	fs::rename(&tmp, path)
}

impl DataStore for DirectoryStore {
	/// True while any record file is on disk, including unreadable or
	/// newer-schema files that [`list_all`](DataStore::list_all) skips.
	fn has_data(&self) -> bool {
		!self.ids.is_empty()
	}

	fn reset(&mut self) -> Result<(), StorageFault> {
		let ids: Vec<RecordId> = self.ids.iter().copied().collect();
		for id in ids {
			self.remove(id)?;
		}
		Ok(())
	}

	fn enqueue(&mut self, payload: Payload) -> Result<QueuedRecord, StorageFault> {
		let id = RecordId(self.next_id);
		self.next_id += 1;
		if let Err(e) = self.write_index() {
			self.next_id -= 1;
			return Err(e);
		}

		let stored = StoredRecord {
			schema_version: SCHEMA_VERSION,
			record: QueuedRecord::new(id, payload),
		};
		let bytes = serde_json::to_vec(&stored)?;
		write_atomic(&self.record_path(id), &bytes)?;
		self.ids.insert(id);

		Ok(stored.record)
	}

	fn list_all(&mut self) -> Result<Vec<QueuedRecord>, StorageFault> {
		let mut records = Vec::with_capacity(self.ids.len());
		let mut vanished = Vec::new();
		for id in &self.ids {
			match self.read_record(*id)? {
				RecordFile::Found(record) => records.push(record),
				RecordFile::Vanished => vanished.push(*id),
				RecordFile::Skipped => {}
			}
		}
		for id in vanished {
			self.ids.remove(&id);
		}
		Ok(records)
	}

	fn remove(&mut self, id: RecordId) -> Result<(), StorageFault> {
		match fs::remove_file(self.record_path(id)) {
			Ok(()) => {}
			Err(e) if e.kind() == ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}
		self.ids.remove(&id);
		Ok(())
	}
}
