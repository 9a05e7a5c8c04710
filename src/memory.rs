use crate::{DataStore, Payload, QueuedRecord, RecordId, StorageFault};
use std::collections::BTreeMap;

/// A volatile store that keeps queued records in memory.
///
/// Useful where nothing needs to survive a restart (tests, or a host whose
/// durable storage turned out to be unavailable).
#[derive(Debug, Default)]
pub struct MemoryStore {
	items: BTreeMap<RecordId, QueuedRecord>,
	next_id: u64,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl DataStore for MemoryStore {
	fn has_data(&self) -> bool {
		!self.items.is_empty()
	}

	fn reset(&mut self) -> Result<(), StorageFault> {
		self.items.clear();
		Ok(())
	}

	fn enqueue(&mut self, payload: Payload) -> Result<QueuedRecord, StorageFault> {
		let id = RecordId(self.next_id);
		self.next_id += 1;

		let record = QueuedRecord::new(id, payload);
		self.items.insert(id, record.clone());
		Ok(record)
	}

	fn list_all(&mut self) -> Result<Vec<QueuedRecord>, StorageFault> {
		Ok(self.items.values().cloned().collect())
	}

	fn remove(&mut self, id: RecordId) -> Result<(), StorageFault> {
		self.items.remove(&id);
		Ok(())
	}
}
