use crate::{
	DataStore, Forwarder, Payload, QueuedRecord, RecordId, StorageFault, TransportFault,
};
use std::sync::{Mutex, MutexGuard};

#[cfg(not(target_arch = "wasm32"))]
type BoxedStore = Box<dyn DataStore + Send>;

#[cfg(target_arch = "wasm32")]
type BoxedStore = Box<dyn DataStore>;

/// A thread-safe offline submission queue over any [`DataStore`] backend.
///
/// OfflineQueue uses interior mutability through a Mutex so the submission path
/// and the reconnect drain can share one queue. Every store operation takes the
/// lock for its own duration only; the lock is never held across a network call,
/// so records can be enqueued while a drain is in flight.
pub struct OfflineQueue {
	store: Mutex<BoxedStore>,
}

// SAFETY: On WASM32, there are no threads. Send and Sync are vacuously satisfied
// because there's nowhere to send to and nothing to synchronize with.
//
// This allows WebStore (which contains Rc<IdbDatabase>) to back an OfflineQueue
// shared between the submitter and the connectivity monitor.
//
// NOTE: If WASM gains real threading support (wasm32 + atomics + shared memory),
// this will need to be revisited.
#[cfg(target_arch = "wasm32")]
unsafe impl Send for OfflineQueue {}

#[cfg(target_arch = "wasm32")]
unsafe impl Sync for OfflineQueue {}

/// What happened to one record during a drain.
#[derive(Debug)]
pub enum DrainOutcome {
	/// Forwarded and removed from the queue.
	Synced,
	/// The forward failed; the record stays queued for the next reconnect.
	Retained(TransportFault),
	/// The forward succeeded but the local delete did not. The record stays
	/// queued and will be delivered again on the next drain.
	Unremoved(StorageFault),
}

impl DrainOutcome {
	pub fn is_synced(&self) -> bool {
		matches!(self, DrainOutcome::Synced)
	}
}

/// Per-record results of one [`OfflineQueue::drain_and_sync`] pass.
///
/// Partial success is a normal outcome, not an error.
#[derive(Debug, Default)]
pub struct DrainReport {
	pub outcomes: Vec<(RecordId, DrainOutcome)>,
}

impl DrainReport {
	/// Number of records the drain tried to forward.
	pub fn attempted(&self) -> usize {
		self.outcomes.len()
	}

	pub fn synced(&self) -> Vec<RecordId> {
		self.ids_where(|o| matches!(o, DrainOutcome::Synced))
	}

	pub fn retained(&self) -> Vec<RecordId> {
		self.ids_where(|o| matches!(o, DrainOutcome::Retained(_)))
	}

	pub fn unremoved(&self) -> Vec<RecordId> {
		self.ids_where(|o| matches!(o, DrainOutcome::Unremoved(_)))
	}

	/// True when every attempted record was synced and removed.
	pub fn is_complete(&self) -> bool {
		self.outcomes.iter().all(|(_, o)| o.is_synced())
	}

	fn ids_where(&self, pred: impl Fn(&DrainOutcome) -> bool) -> Vec<RecordId> {
		self.outcomes
			.iter()
			.filter(|(_, outcome)| pred(outcome))
			.map(|(id, _)| *id)
			.collect()
	}
}

impl OfflineQueue {
	/// Creates a new queue over the provided store implementation.
	///
	/// # Examples
	/// ```
	/// use intakequeue::{MemoryStore, OfflineQueue};
	///
	/// let queue = OfflineQueue::new(MemoryStore::new());
	/// assert!(!queue.has_data());
	/// ```
	#[cfg(not(target_arch = "wasm32"))]
	pub fn new(store: impl DataStore + Send + 'static) -> Self {
		Self {
			store: Mutex::new(Box::new(store)),
		}
	}

	/// Creates a new queue over the provided store implementation.
	#[cfg(target_arch = "wasm32")]
	pub fn new(store: impl DataStore + 'static) -> Self {
		Self {
			store: Mutex::new(Box::new(store)),
		}
	}

	fn lock(&self) -> Result<MutexGuard<'_, BoxedStore>, StorageFault> {
		self.store.lock().map_err(|_| StorageFault::Poisoned)
	}

	/// Checks if any record is waiting for delivery.
	pub fn has_data(&self) -> bool {
		self.lock().is_ok_and(|store| store.has_data())
	}

	/// Removes every queued record without forwarding it.
	pub fn reset(&self) -> Result<(), StorageFault> {
		self.lock()?.reset()
	}

	/// Buffers a submission for later delivery.
	///
	/// # Examples
	/// ```
	/// use intakequeue::{MemoryStore, OfflineQueue};
	/// use serde_json::json;
	///
	/// let queue = OfflineQueue::new(MemoryStore::new());
	/// let payload = json!({"firstName": "Ada", "weight": 60}).as_object().cloned().unwrap();
	///
	/// let record = queue.enqueue(payload.clone()).unwrap();
	/// assert_eq!(queue.list_all().unwrap(), vec![record]);
	/// ```
	pub fn enqueue(&self, payload: Payload) -> Result<QueuedRecord, StorageFault> {
		let record = self.lock()?.enqueue(payload)?;
		tracing::debug!(record_id = %record.id, "queued submission for later sync");
		Ok(record)
	}

	/// Buffers a submission and waits until the backend reports it durably
	/// stored.
	///
	/// If persisting fails the record is taken back out of the queue and the
	/// fault is returned, so a caller never reports a submission as saved when
	/// it would not survive a restart.
	pub async fn enqueue_durable(&self, payload: Payload) -> Result<QueuedRecord, StorageFault> {
		let (record, written) = {
			let mut store = self.lock()?;
			let record = store.enqueue(payload)?;
			let written = store.confirm(record.id);
			(record, written)
		};

		if let Err(e) = written.await {
			tracing::warn!(record_id = %record.id, error = %e, "queued submission was not persisted");
			if let Err(cleanup) = self.remove(record.id) {
				tracing::error!(record_id = %record.id, error = %cleanup, "failed to drop unpersisted record");
			}
			return Err(e);
		}

		tracing::debug!(record_id = %record.id, "queued submission for later sync");
		Ok(record)
	}

	/// Returns a snapshot of every queued record.
	pub fn list_all(&self) -> Result<Vec<QueuedRecord>, StorageFault> {
		self.lock()?.list_all()
	}

	/// Deletes a queued record. Idempotent.
	pub fn remove(&self, id: RecordId) -> Result<(), StorageFault> {
		self.lock()?.remove(id)
	}

	/// Forwards every record queued at the start of the call, one at a time,
	/// removing each one right after its own successful forward.
	///
	/// Each record goes out as [`QueuedRecord::to_submission`], which carries
	/// the original capture time as `timestamp`.
	///
	/// A failed forward leaves that record queued and moves on to the next one.
	/// Records enqueued while the drain runs are left for the next drain. The
	/// only error returned is a failure to take the initial snapshot.
	///
	/// Delivery is at-least-once: if the delete after a successful forward
	/// fails, the record is reported as [`DrainOutcome::Unremoved`] and will be
	/// forwarded again next time.
	pub async fn drain_and_sync<F: Forwarder>(
		&self,
		forwarder: &F,
	) -> Result<DrainReport, StorageFault> {
		let records = self.list_all()?;
		let mut report = DrainReport::default();
		if records.is_empty() {
			tracing::debug!("offline queue empty, nothing to sync");
			return Ok(report);
		}

		tracing::info!(pending = records.len(), "syncing offline queue");
		for record in records {
			let outcome = match forwarder.forward(&record.to_submission()).await {
				Ok(()) => match self.remove(record.id) {
					Ok(()) => {
						tracing::debug!(record_id = %record.id, "record synced");
						DrainOutcome::Synced
					}
					Err(e) => {
						tracing::error!(
							record_id = %record.id,
							error = %e,
							"record forwarded but not removed, it will be sent again"
						);
						DrainOutcome::Unremoved(e)
					}
				},
				Err(e) => {
					tracing::warn!(
						record_id = %record.id,
						error = %e,
						"forward failed, keeping record for next reconnect"
					);
					DrainOutcome::Retained(e)
				}
			};
			report.outcomes.push((record.id, outcome));
		}

		tracing::info!(
			synced = report.synced().len(),
			retained = report.retained().len(),
			unremoved = report.unremoved().len(),
			"offline queue sync finished"
		);
		Ok(report)
	}
}
