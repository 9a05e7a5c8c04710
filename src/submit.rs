use crate::{Forwarder, OfflineQueue, Payload, StatusHandle, SubmitError};
use std::fmt;
use std::sync::Arc;

/// What the user is told after pressing submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
	/// Delivered straight to the endpoint.
	Submitted,
	/// Stored locally; it goes out on the next reconnect.
	SavedPendingSync,
	/// Neither path worked. Details stay in the logs.
	Failed,
}

impl fmt::Display for SubmissionOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SubmissionOutcome::Submitted => "submitted",
			SubmissionOutcome::SavedPendingSync => "saved, pending sync",
			SubmissionOutcome::Failed => "submission failed",
		})
	}
}

/// The form's submission boundary: sends when online, queues when offline.
pub struct Submitter<F> {
	queue: Arc<OfflineQueue>,
	forwarder: F,
	status: StatusHandle,
}

impl<F: Forwarder> Submitter<F> {
	pub fn new(queue: Arc<OfflineQueue>, forwarder: F, status: StatusHandle) -> Self {
		Self {
			queue,
			forwarder,
			status,
		}
	}

	/// Submits and returns the fault, if any, for callers that want detail.
	pub async fn try_submit(&self, payload: Payload) -> Result<SubmissionOutcome, SubmitError> {
		if self.status.is_online() {
			self.forwarder.forward(&payload).await?;
			Ok(SubmissionOutcome::Submitted)
		} else {
			self.queue.enqueue_durable(payload).await?;
			Ok(SubmissionOutcome::SavedPendingSync)
		}
	}

	/// Submits and collapses any fault into [`SubmissionOutcome::Failed`].
	pub async fn submit(&self, payload: Payload) -> SubmissionOutcome {
		match self.try_submit(payload).await {
			Ok(outcome) => outcome,
			Err(e) => {
				tracing::error!(error = %e, "submission failed");
				SubmissionOutcome::Failed
			}
		}
	}
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
	use super::*;
	use crate::{
		forward_fn, Connectivity, ConnectivityMonitor, ConnectivitySwitch, DataStore, MemoryStore,
		QueuedRecord, RecordId, StorageFault, TransportFault,
	};
	use crate::queue::tests::UnpersistedStore;
	use serde_json::json;

	struct BrokenStore;

	impl DataStore for BrokenStore {
		fn has_data(&self) -> bool {
			false
		}
		fn reset(&mut self) -> Result<(), StorageFault> {
			Ok(())
		}
		fn enqueue(&mut self, _payload: Payload) -> Result<QueuedRecord, StorageFault> {
			Err(StorageFault::Unavailable("quota exceeded".into()))
		}
		fn list_all(&mut self) -> Result<Vec<QueuedRecord>, StorageFault> {
			Ok(Vec::new())
		}
		fn remove(&mut self, _id: RecordId) -> Result<(), StorageFault> {
			Ok(())
		}
	}

	fn payload() -> Payload {
		json!({"firstName": "Grace", "phoneNumber": "5551234567"})
			.as_object()
			.cloned()
			.unwrap()
	}

	#[test]
	fn test_user_facing_messages() {
		assert_eq!(SubmissionOutcome::Submitted.to_string(), "submitted");
		assert_eq!(SubmissionOutcome::SavedPendingSync.to_string(), "saved, pending sync");
		assert_eq!(SubmissionOutcome::Failed.to_string(), "submission failed");
	}

	#[tokio::test]
	async fn test_online_sends_directly() {
		let queue = Arc::new(OfflineQueue::new(MemoryStore::new()));
		let forwarder = forward_fn(|_p: Payload| async { Ok(()) });
		let monitor = ConnectivityMonitor::new(
			ConnectivitySwitch::new(Connectivity::Online),
			queue.clone(),
			forwarder.clone(),
		);
		let submitter = Submitter::new(queue.clone(), forwarder, monitor.status_handle());

		assert_eq!(submitter.submit(payload()).await, SubmissionOutcome::Submitted);
		assert!(!queue.has_data());
	}

	#[tokio::test]
	async fn test_offline_queues() {
		let queue = Arc::new(OfflineQueue::new(MemoryStore::new()));
		let forwarder = forward_fn(|_p: Payload| async { Err(TransportFault::Other("unreachable".into())) });
		let monitor = ConnectivityMonitor::new(
			ConnectivitySwitch::new(Connectivity::Offline),
			queue.clone(),
			forwarder.clone(),
		);
		let submitter = Submitter::new(queue.clone(), forwarder, monitor.status_handle());

		assert_eq!(submitter.submit(payload()).await, SubmissionOutcome::SavedPendingSync);
		assert_eq!(queue.list_all().unwrap()[0].payload, payload());
	}

	#[tokio::test]
	async fn test_status_follows_monitor() {
		let queue = Arc::new(OfflineQueue::new(MemoryStore::new()));
		let forwarder = forward_fn(|_p: Payload| async { Ok(()) });
		let monitor = ConnectivityMonitor::new(
			ConnectivitySwitch::new(Connectivity::Online),
			queue.clone(),
			forwarder.clone(),
		);
		let submitter = Submitter::new(queue.clone(), forwarder, monitor.status_handle());

		monitor.on_offline();
		assert_eq!(submitter.submit(payload()).await, SubmissionOutcome::SavedPendingSync);

		monitor.on_online().await;
		assert!(!queue.has_data(), "reconnect drained the queued submission");
		assert_eq!(submitter.submit(payload()).await, SubmissionOutcome::Submitted);
	}

	#[tokio::test]
	async fn test_faults_report_failed() {
		let queue = Arc::new(OfflineQueue::new(BrokenStore));
		let offline = ConnectivityMonitor::new(
			ConnectivitySwitch::new(Connectivity::Offline),
			queue.clone(),
			forward_fn(|_p: Payload| async { Ok(()) }),
		);
		let submitter = Submitter::new(
			queue.clone(),
			forward_fn(|_p: Payload| async { Ok(()) }),
			offline.status_handle(),
		);
		assert!(matches!(
			submitter.try_submit(payload()).await,
			Err(SubmitError::Storage(StorageFault::Unavailable(_)))
		));
		assert_eq!(submitter.submit(payload()).await, SubmissionOutcome::Failed);

		let online = ConnectivityMonitor::new(
			ConnectivitySwitch::new(Connectivity::Online),
			queue.clone(),
			forward_fn(|_p: Payload| async { Ok(()) }),
		);
		let rejecting = Submitter::new(
			queue,
			forward_fn(|_p: Payload| async { Err(TransportFault::Rejected { status: 500 }) }),
			online.status_handle(),
		);
		assert_eq!(rejecting.submit(payload()).await, SubmissionOutcome::Failed);
	}

	#[tokio::test]
	async fn test_unpersisted_offline_submission_fails() {
		let queue = Arc::new(OfflineQueue::new(UnpersistedStore(MemoryStore::new())));
		let forwarder = forward_fn(|_p: Payload| async { Ok(()) });
		let monitor = ConnectivityMonitor::new(
			ConnectivitySwitch::new(Connectivity::Offline),
			queue.clone(),
			forwarder.clone(),
		);
		let submitter = Submitter::new(queue.clone(), forwarder, monitor.status_handle());

		assert_eq!(submitter.submit(payload()).await, SubmissionOutcome::Failed);
		assert!(!queue.has_data());
	}
}
